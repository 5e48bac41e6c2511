#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole remainder is taken verbatim.
pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "add",
        action: "add_prompts",
    },
    CommandSpec {
        command: "model",
        action: "set_model",
    },
    CommandSpec {
        command: "aspect",
        action: "set_aspect_ratio",
    },
    CommandSpec {
        command: "negative",
        action: "set_negative_prompt",
    },
    CommandSpec {
        command: "person",
        action: "set_person_generation",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "import",
        action: "import_prompts",
    },
    CommandSpec {
        command: "export",
        action: "export_results",
    },
];

/// Commands taking one prompt/result reference (position, id or id prefix).
pub(crate) const REF_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "delete",
        action: "delete_prompt",
    },
    CommandSpec {
        command: "forget",
        action: "delete_result",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
    CommandSpec {
        command: "prompts",
        action: "list_prompts",
    },
    CommandSpec {
        command: "clear",
        action: "clear_prompts",
    },
    CommandSpec {
        command: "run",
        action: "run_batch",
    },
    CommandSpec {
        command: "results",
        action: "list_results",
    },
    CommandSpec {
        command: "forget_all",
        action: "clear_results",
    },
    CommandSpec {
        command: "models",
        action: "list_models",
    },
    CommandSpec {
        command: "settings",
        action: "show_settings",
    },
];

pub(crate) const EDIT_COMMAND: CommandSpec = CommandSpec {
    command: "edit",
    action: "edit_prompt",
};

pub(crate) const DURATION_COMMAND: CommandSpec = CommandSpec {
    command: "duration",
    action: "set_duration",
};

pub(crate) const AUTO_DELIVER_COMMAND: CommandSpec = CommandSpec {
    command: "autodeliver",
    action: "set_auto_deliver",
};

pub const SESSION_HELP_COMMANDS: &[&str] = &[
    "/add <text>",
    "/import <file.txt>",
    "/edit <ref> <text>",
    "/delete <ref>",
    "/clear",
    "/prompts",
    "/model <name>",
    "/models",
    "/aspect <16:9|9:16>",
    "/duration <5-8|default>",
    "/negative [text]",
    "/person [allow_all|allow_adult|dont_allow]",
    "/autodeliver <on|off>",
    "/settings",
    "/run",
    "/results",
    "/forget <ref>",
    "/forget_all",
    "/export <dir>",
    "/help",
    "/quit",
];
