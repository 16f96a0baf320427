//! Prompt Assembly
//!
//! Plain string templates built from scenario fields. Each section is a tagged
//! block so the model can tell role, scenario and guidance apart.

use crate::{
    agent::Agent,
    history::HistoryMessage,
    reply::TERMINATION_MARKER,
    scenario::{AgentConfig, Scenario, ToolConfig},
};
use serde_json::Value;
use std::sync::Arc;

/// Upper bound on the history text embedded in a surrogate prompt.
pub const MAX_HISTORY_CHARS: usize = 10_000;

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Renders a history as `role: text` lines, oldest first.
pub fn format_history(history: &[HistoryMessage]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role, m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keeps the most recent `max_chars` characters of `text`.
pub fn truncate_front(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    let start = text.char_indices().nth(skip).map(|(i, _)| i).unwrap_or(0);
    &text[start..]
}

/// Reminder injected into a tool result when the tool ends the conversation.
pub fn finalization_reminder() -> String {
    format!(
        "\n<FINALIZATION>\n\
         Your response will be the last message in the conversation.\n\
         Compose ONE final message to the remote agent summarizing the outcome and key reasons.\n\
         IMPORTANT: Include the exact phrase \"{TERMINATION_MARKER}\" at the conclusion of your response.\n\
         </FINALIZATION>\n"
    )
}

fn role_block(agent: &Agent) -> Vec<String> {
    let config = &agent.config;
    let principal = &config.principal;
    let mut parts = vec![
        "<YOUR_ROLE>".to_string(),
        format!(
            "You are agent \"{}\" for {}.",
            agent.id,
            principal.name.as_deref().unwrap_or("Unknown")
        ),
    ];
    if let Some(description) = &principal.description {
        parts.push(format!("Principal Info: {description}"));
    }
    if let Some(kind) = &principal.kind {
        parts.push(format!("Principal Type: {kind}"));
    }
    if let Some(system) = &config.system_prompt {
        parts.push(format!("System: {system}"));
    }
    if let Some(situation) = &config.situation {
        parts.push(format!("Situation: {situation}"));
    }
    if !config.goals.is_empty() {
        let goals: Vec<String> = config.goals.iter().map(|g| format!("- {g}")).collect();
        parts.push(format!("Goals:\n{}", goals.join("\n")));
    }
    if let Some(kb) = &config.knowledge_base {
        parts.push(format!("Knowledge Base:\n{}", pretty(kb)));
    }
    parts.push("</YOUR_ROLE>".to_string());
    parts
}

fn other_party_block(other: &AgentConfig) -> Vec<String> {
    let mut parts = vec![
        "<OTHER_PARTY>".to_string(),
        format!(
            "{} for {}",
            other.agent_id,
            other.principal.name.as_deref().unwrap_or("Unknown")
        ),
    ];
    if let Some(description) = &other.principal.description {
        parts.push(format!("desc: {description}"));
    }
    if let Some(kind) = &other.principal.kind {
        parts.push(format!("type: {kind}"));
    }
    parts.push("</OTHER_PARTY>".to_string());
    parts
}

/// System prompt for `agent` acting inside `scenario`.
pub fn build_main_prompt(scenario: &Scenario, agent: &Agent) -> String {
    let metadata = &scenario.metadata;
    let mut parts = vec!["<SCENARIO>".to_string()];
    if let Some(title) = metadata.title.as_ref().or(metadata.id.as_ref()) {
        parts.push(format!("Title: {title}"));
    }
    if let Some(description) = &metadata.description {
        parts.push(format!("Description: {description}"));
    }
    if let Some(background) = &metadata.background {
        parts.push(format!("Background: {background}"));
    }
    if let Some(kb) = &scenario.knowledge_base {
        parts.push(format!("Shared Knowledge:\n{}", pretty(kb)));
    }
    parts.push("</SCENARIO>".to_string());

    parts.extend(role_block(agent));

    let others: Vec<&AgentConfig> = scenario
        .agents
        .iter()
        .filter(|a| a.agent_id != agent.id)
        .map(Arc::as_ref)
        .collect();
    if let [other] = others.as_slice() {
        parts.extend(other_party_block(other));
    }

    parts.push(
        "<TOOLING_GUIDANCE>\n\
         - First review the conversation history for required information. If found, do not repeat the tool call.\n\
         - Call only the tools directly related to the request at hand.\n\
         - After obtaining the necessary information, answer with a message directed at the other party.\n\
         - Keep all exchanges in this conversation thread; do not refer to portals, emails or fax.\n\
         </TOOLING_GUIDANCE>"
            .to_string(),
    );
    parts.push(format!(
        "<RESPONSE>\n\
         Reply with a plain-text message for the other party, in a professional tone and without extraneous commentary.\n\
         If this is the final message and the conversation is over, conclude it with the exact phrase \"{TERMINATION_MARKER}\".\n\
         </RESPONSE>"
    ));
    parts.join("\n")
}

/// Prompt asking the model to play the part of a tool that has no real implementation.
pub fn build_tool_surrogate_prompt(
    scenario: &Scenario,
    agent: &AgentConfig,
    tool_name: &str,
    tool: &ToolConfig,
    args: &Value,
    history: &[HistoryMessage],
) -> String {
    let guidance = tool
        .synthesis_guidance
        .as_deref()
        .unwrap_or("no additional guidance provided");
    let schema = tool
        .input_schema
        .as_ref()
        .map(pretty)
        .unwrap_or_else(|| "{}".to_string());
    let metadata = &scenario.metadata;
    let goals = if agent.goals.is_empty() {
        "  (none)".to_string()
    } else {
        agent
            .goals
            .iter()
            .map(|g| format!("  - {g}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let knowledge = agent
        .knowledge_base
        .as_ref()
        .map(pretty)
        .unwrap_or_else(|| "none".to_string());
    let history = format_history(history);

    format!(
        "<TASK>\n\
         You are an omniscient Tool Surrogate / World Simulator for a scenario-driven, multi-agent conversation.\n\
         Simulate a tool call with realistic, in-character results.\n\
         Tool Name: {tool_name}\n\
         Tool Description: {description}\n\
         Input Schema: {schema}\n\
         Input Parameter Values: {args}\n\
         Synthesis Guidance: {guidance}\n\
         </TASK>\n\
         <SCENARIO>\n\
         - id: {id}\n\
         - title: {title}\n\
         - description: {scenario_description}\n\
         </SCENARIO>\n\
         <CONVERSATION_HISTORY>\n{history}\n</CONVERSATION_HISTORY>\n\
         <CALLING_AGENT>\n\
         - agentId: {agent_id}\n\
         - principal: {principal} - {principal_description}\n\
         - situation: {situation}\n\
         - goals:\n{goals}\n\
         </CALLING_AGENT>\n\
         <KNOWLEDGE_BASE>\n{knowledge}\n</KNOWLEDGE_BASE>\n\
         <GENERAL_GUIDANCE>\n\
         - Use the tool name and the provided arguments as the primary source of truth.\n\
         - Conversation history may inform realism, but do not invent unrelated outputs.\n\
         - If inputs are insufficient, include concise next-step suggestions in a \"summary\" field.\n\
         - Do not switch tools or simulate other systems. Only return what this tool would produce.\n\
         - Prefer concise, well-structured content.\n\
         </GENERAL_GUIDANCE>",
        description = tool.description.as_deref().unwrap_or("no description provided"),
        args = args,
        id = metadata.id.as_deref().unwrap_or("(missing-id)"),
        title = metadata.title.as_deref().unwrap_or("(untitled)"),
        scenario_description = metadata.description.as_deref().unwrap_or_default(),
        history = truncate_front(&history, MAX_HISTORY_CHARS),
        agent_id = agent.agent_id,
        principal = agent.principal.name.as_deref().unwrap_or("(principal not specified)"),
        principal_description = agent.principal.description.as_deref().unwrap_or_default(),
        situation = agent.situation.as_deref().unwrap_or("(not specified)"),
    )
}
