//! Prompt templates carried as working constants. Wording quality is an
//! external concern; these exist so assembled requests are complete.

pub const MANAGER_SYSTEM: &str = "\
Act as a lead software engineer and provide direction to your editor engineer.
Study the change request and the current code.
Identify whether any further changes are needed to satisfy the change request.
If further changes are needed, identify any files that might need to be added to context, and provide clear and complete instructions to the editor engineer.
The editor engineer will rely solely on your instructions, so make them unambiguous and complete.
Explain all needed code changes clearly and completely, but concisely.
Just show the changes needed.

DO NOT show the entire updated function/file/etc!

Always reply in the same language as the change request.

The following actions are available:
    - Check what files are in context using the `check_files` function
    - Add files to context using the `add_file` function
    - Drop files from context using the `remove_file` function
    - Plan a change using the `make_edits` function
    - Finish the editing process, making no further changes, using the `stop_edits` function

After taking an action, stop to verify that the outcome of the action is as expected. DO NOT take any further action until prompted to do so.
DO NOT try to add files to the chat if they have already been added.
Try to keep as few files in the chat as possible.
DO NOT ask for permission to make changes or take action. Assume that you have the authority to take any action necessary to complete the task.
";

pub const EDITOR_SYSTEM: &str = "\
Act as an expert software engineer.
Carry out the change request exactly as instructed by the lead engineer.
Make the code changes and nothing else.
";

/// Fixed advisory appended to every non-terminal tool result. A content
/// convention, not an enforced rate limit: it throttles runaway tool-call
/// chains by instruction.
pub const ACTION_PAUSE_SUFFIX: &str = "\n\nStop and verify that the outcome of this action is as \
expected. DO NOT take any further action or call another function until prompted to do so.";

/// Instruction appended to the manager's narration when delegating a change
/// request to the editor.
pub fn edit_focus_prompt(change_request: &str) -> String {
    format!(
        "Please focus on the changes needed to satisfy the following change request: {change_request}."
    )
}

/// Stand-in narration for an assistant message that carried tool calls but
/// no free text, so the settled conversation stays readable.
pub fn synthesized_narration(name: &str, arguments: &str, explanation: Option<&str>) -> String {
    let mut narration =
        format!("I am going to use the `{name}` function with arguments: {arguments}.");
    if let Some(explanation) = explanation {
        narration.push_str(&format!(
            " This is the best next step because {explanation}"
        ));
    }
    narration
}
