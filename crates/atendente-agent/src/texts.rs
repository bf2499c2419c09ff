// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canned customer-facing texts.
//!
//! None of these ever carry internal error details.

/// Control phrase that hands the conversation over to a human.
pub const END_PHRASE: &str = "encerrar atendimento";

/// Control phrase that turns automation back on.
pub const RESUME_PHRASE: &str = "retomar atendimento";

pub const END_CONFIRMATION: &str =
    "Atendimento automático encerrado. Um atendente humano vai continuar a conversa.";

pub const RESUME_CONFIRMATION: &str =
    "Atendimento automático retomado. Como posso ajudar?";

pub const SCHEDULING_FAILED: &str =
    "Desculpe, não consegui concluir o agendamento agora. Pode tentar novamente em instantes?";

pub const SLOT_UNAVAILABLE: &str =
    "Desculpe, esse horário não está disponível. Pode sugerir outro horário?";

pub const NO_CALENDAR: &str =
    "Desculpe, ainda não temos agenda disponível para marcações por aqui.";

pub const INVALID_SLOT: &str =
    "Desculpe, não entendi o horário desejado. Pode informar a data e a hora?";

pub const TOOL_FAILED: &str =
    "Desculpe, tive um problema para consultar essa informação. Pode repetir a pergunta?";

/// Which control phrase, if any, a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    End,
    Resume,
}

/// Matches the control phrases case-insensitively, ignoring surrounding
/// whitespace and trailing punctuation.
pub fn control_command(text: &str) -> Option<ControlCommand> {
    let normalized = text
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_lowercase();
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    match normalized.as_str() {
        END_PHRASE => Some(ControlCommand::End),
        RESUME_PHRASE => Some(ControlCommand::Resume),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrases_match_loosely() {
        assert_eq!(control_command("Retomar atendimento"), Some(ControlCommand::Resume));
        assert_eq!(control_command("  ENCERRAR   atendimento!! "), Some(ControlCommand::End));
        assert_eq!(control_command("retomar atendimento."), Some(ControlCommand::Resume));
    }

    #[test]
    fn other_text_is_not_a_command() {
        assert_eq!(control_command("quero retomar atendimento amanhã"), None);
        assert_eq!(control_command(""), None);
        assert_eq!(control_command("encerrar"), None);
    }
}
