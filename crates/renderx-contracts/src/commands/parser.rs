use std::path::PathBuf;

use super::registry::{
    CommandSpec, AUTO_DELIVER_COMMAND, DURATION_COMMAND, EDIT_COMMAND, NO_ARG_COMMANDS,
    RAW_ARG_COMMANDS, REF_COMMANDS, SINGLE_PATH_COMMANDS,
};

/// One line of interactive input, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Noop,
    Help,
    Quit,
    AddPrompts(String),
    ImportPrompts(PathBuf),
    EditPrompt { reference: String, text: String },
    DeletePrompt(String),
    ClearPrompts,
    ListPrompts,
    SetModel(String),
    ListModels,
    SetAspectRatio(String),
    SetDuration(Option<u32>),
    SetNegativePrompt(Option<String>),
    SetPersonGeneration(Option<String>),
    SetAutoDeliver(bool),
    ShowSettings,
    RunBatch,
    ListResults,
    DeleteResult(String),
    ClearResults,
    ExportResults(PathBuf),
    Invalid { command: String, reason: String },
    Unknown { command: String, arg: String },
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

fn optional_text(arg: &str) -> Option<String> {
    let trimmed = arg.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("default") {
        return None;
    }
    Some(trimmed.to_string())
}

fn invalid(command: &str, reason: impl Into<String>) -> SessionCommand {
    SessionCommand::Invalid {
        command: command.to_string(),
        reason: reason.into(),
    }
}

fn raw_arg_command(action: &str, command: &str, arg: &str) -> SessionCommand {
    match action {
        "add_prompts" => {
            if arg.is_empty() {
                return invalid(command, "/add requires prompt text");
            }
            SessionCommand::AddPrompts(arg.to_string())
        }
        "set_model" => {
            if arg.is_empty() {
                return invalid(command, "/model requires a model name");
            }
            SessionCommand::SetModel(arg.to_string())
        }
        "set_aspect_ratio" => {
            if arg.is_empty() {
                return invalid(command, "/aspect requires a ratio such as 16:9");
            }
            SessionCommand::SetAspectRatio(arg.to_string())
        }
        "set_negative_prompt" => SessionCommand::SetNegativePrompt(optional_text(arg)),
        _ => SessionCommand::SetPersonGeneration(optional_text(arg)),
    }
}

pub fn parse_command(text: &str) -> SessionCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return SessionCommand::Noop;
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return SessionCommand::AddPrompts(raw_trimmed.to_string());
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return SessionCommand::AddPrompts(raw_trimmed.to_string());
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if let Some(action) = find_action(&command, RAW_ARG_COMMANDS) {
        return raw_arg_command(action, &command, arg);
    }

    if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
        let path = parse_single_path_arg(arg);
        if path.is_empty() {
            return invalid(&command, format!("/{command} requires a path"));
        }
        return match action {
            "import_prompts" => SessionCommand::ImportPrompts(PathBuf::from(path)),
            _ => SessionCommand::ExportResults(PathBuf::from(path)),
        };
    }

    if let Some(action) = find_action(&command, REF_COMMANDS) {
        if arg.is_empty() {
            return invalid(&command, format!("/{command} requires a position or id"));
        }
        return match action {
            "delete_prompt" => SessionCommand::DeletePrompt(arg.to_string()),
            _ => SessionCommand::DeleteResult(arg.to_string()),
        };
    }

    if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
        return match action {
            "help" => SessionCommand::Help,
            "quit" => SessionCommand::Quit,
            "list_prompts" => SessionCommand::ListPrompts,
            "clear_prompts" => SessionCommand::ClearPrompts,
            "run_batch" => SessionCommand::RunBatch,
            "list_results" => SessionCommand::ListResults,
            "clear_results" => SessionCommand::ClearResults,
            "list_models" => SessionCommand::ListModels,
            _ => SessionCommand::ShowSettings,
        };
    }

    if command == EDIT_COMMAND.command {
        let Some((reference, text)) = arg.split_once(char::is_whitespace) else {
            return invalid(&command, "/edit requires a position or id and new text");
        };
        let text = text.trim();
        if text.is_empty() {
            return invalid(&command, "/edit requires new text");
        }
        return SessionCommand::EditPrompt {
            reference: reference.to_string(),
            text: text.to_string(),
        };
    }

    if command == DURATION_COMMAND.command {
        if arg.is_empty() || arg.eq_ignore_ascii_case("default") {
            return SessionCommand::SetDuration(None);
        }
        let digits = arg.trim_end_matches(['s', 'S']);
        return match digits.parse::<u32>() {
            Ok(value) => SessionCommand::SetDuration(Some(value)),
            Err(_) => invalid(&command, format!("'{arg}' is not a number of seconds")),
        };
    }

    if command == AUTO_DELIVER_COMMAND.command {
        return match arg.to_ascii_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => SessionCommand::SetAutoDeliver(true),
            "off" | "false" | "no" | "0" => SessionCommand::SetAutoDeliver(false),
            _ => invalid(&command, "/autodeliver expects on or off"),
        };
    }

    SessionCommand::Unknown {
        command,
        arg: arg.to_string(),
    }
}
