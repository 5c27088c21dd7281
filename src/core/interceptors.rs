//! Global interceptors
//!
//! Checked before any step handler, in priority order: handoff, start over,
//! help, quote status, small talk, knowledge base. The first hit answers the
//! turn.

use rand::seq::IndexedRandom;

use crate::config::messages;
use crate::knowledge::{self, FaqEntry};
use crate::vin::{is_valid_vin, normalize_vin};

use super::state::Step;

const HANDOFF_KEYWORDS: [&str; 4] = ["humano", "agente", "asesor", "llamar"];
const RESTART_KEYWORDS: [&str; 4] = ["volver", "inicio", "empezar de nuevo", "regresar"];
const HELP_KEYWORDS: [&str; 5] = ["ayuda", "no entiendo", "como hago", "cómo hago", "help"];
const QUOTE_STATUS_KEYWORDS: [&str; 5] = [
    "estado de mi cotización",
    "estado de mi cotizacion",
    "no recibí correo",
    "no recibi correo",
    "no me contactaron",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmallTalk {
    Greeting,
    Thanks,
    Ack,
    Yes,
    No,
}

impl SmallTalk {
    fn classify(normalized: &str, step: Step) -> Option<Self> {
        match normalized {
            "hola" | "buenas" | "buenas tardes" | "buenos días" | "buenos dias" => {
                Some(SmallTalk::Greeting)
            }
            "gracias" | "muchas gracias" | "mil gracias" => Some(SmallTalk::Thanks),
            "ok" | "vale" | "entendido" | "perfecto" | "listo" => Some(SmallTalk::Ack),
            // yes and no carry meaning while a quote awaits confirmation
            "si" | "sí" if step != Step::ConfirmQuote => Some(SmallTalk::Yes),
            "no" if step != Step::ConfirmQuote => Some(SmallTalk::No),
            _ => None,
        }
    }

    pub fn replies(self) -> &'static [&'static str] {
        match self {
            SmallTalk::Greeting => &messages::SMALL_TALK_GREETING,
            SmallTalk::Thanks => &messages::SMALL_TALK_THANKS,
            SmallTalk::Ack => &messages::SMALL_TALK_ACK,
            SmallTalk::Yes => &messages::SMALL_TALK_YES,
            SmallTalk::No => &messages::SMALL_TALK_NO,
        }
    }

    pub fn reply(self) -> &'static str {
        self.replies()
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(messages::SMALL_TALK_ACK[0])
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Interception {
    Handoff,
    Restart,
    Help,
    QuoteStatus,
    SmallTalk(SmallTalk),
    Faq(&'static FaqEntry),
}

/// Where the turn is happening, for step-aware suppression
#[derive(Debug, Clone, Copy)]
pub struct InterceptScope {
    pub step: Step,
    pub manual_entry: bool,
    pub quick_reply: bool,
}

impl InterceptScope {
    /// Free text here is data the user is typing in
    fn capturing_data(&self) -> bool {
        self.step.is_contact_capture() || self.manual_entry
    }
}

/// Lowercased, with surrounding punctuation stripped for exact matching
fn normalize_small_talk(lower: &str) -> &str {
    lower.trim_matches(|c: char| c.is_whitespace() || "!¡?¿.,".contains(c))
}

pub fn intercept(input: &str, scope: InterceptScope) -> Option<Interception> {
    if scope.step == Step::CollectVehicleInfo
        && !scope.manual_entry
        && is_valid_vin(&normalize_vin(input))
    {
        return None;
    }

    let lower = input.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }

    if HANDOFF_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some(Interception::Handoff);
    }
    if RESTART_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some(Interception::Restart);
    }

    let questions_allowed = !scope.capturing_data();

    if questions_allowed && !scope.quick_reply && HELP_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some(Interception::Help);
    }
    if questions_allowed && QUOTE_STATUS_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some(Interception::QuoteStatus);
    }

    if let Some(talk) = SmallTalk::classify(normalize_small_talk(&lower), scope.step) {
        return Some(Interception::SmallTalk(talk));
    }

    if questions_allowed && !scope.quick_reply {
        return knowledge::resolve(&lower).map(Interception::Faq);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(step: Step) -> InterceptScope {
        InterceptScope {
            step,
            manual_entry: false,
            quick_reply: false,
        }
    }

    #[test]
    fn test_priority_order() {
        // handoff beats restart
        assert!(matches!(
            intercept("Volver y hablar con un asesor", at(Step::Welcome)),
            Some(Interception::Handoff)
        ));
        assert!(matches!(
            intercept("Volver al inicio ⬅️", at(Step::AskEmail)),
            Some(Interception::Restart)
        ));
        assert!(matches!(
            intercept("No, empezar de nuevo", at(Step::Welcome)),
            Some(Interception::Restart)
        ));
        assert!(matches!(
            intercept("Llamar 📞", at(Step::Welcome)),
            Some(Interception::Handoff)
        ));
        // help beats the help-index FAQ entry
        assert!(matches!(
            intercept("necesito ayuda", at(Step::Welcome)),
            Some(Interception::Help)
        ));
    }

    #[test]
    fn test_small_talk_exact_match() {
        assert!(matches!(
            intercept("hola", at(Step::CollectVehicleInfo)),
            Some(Interception::SmallTalk(SmallTalk::Greeting))
        ));
        assert!(matches!(
            intercept("¡Hola!", at(Step::AskVehicleCount)),
            Some(Interception::SmallTalk(SmallTalk::Greeting))
        ));
        assert!(matches!(
            intercept("Gracias", at(Step::Finish)),
            Some(Interception::SmallTalk(SmallTalk::Thanks))
        ));
        assert!(intercept("hola, quiero saber de mi póliza de salud", at(Step::AskVehicleCount))
            .map(|i| !matches!(i, Interception::SmallTalk(_)))
            .unwrap_or(true));
    }

    #[test]
    fn test_yes_no_reserved_in_confirm_quote() {
        assert!(intercept("sí", at(Step::ConfirmQuote)).is_none());
        assert!(intercept("no", at(Step::ConfirmQuote)).is_none());
        assert!(matches!(
            intercept("si", at(Step::AskBirthdate)),
            Some(Interception::SmallTalk(SmallTalk::Yes))
        ));
        assert!(matches!(
            intercept("no", at(Step::PolicyMenu)),
            Some(Interception::SmallTalk(SmallTalk::No))
        ));
    }

    #[test]
    fn test_faq_in_vin_flow() {
        match intercept("¿qué descuentos tienen?", at(Step::CollectVehicleInfo)) {
            Some(Interception::Faq(entry)) => assert_eq!(entry.id, "discounts"),
            other => panic!("expected faq, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_vin_bypasses_everything() {
        assert!(intercept("1HGCM82633A004352", at(Step::CollectVehicleInfo)).is_none());
        assert!(intercept(" 1hgcm82633a004352 ", at(Step::CollectVehicleInfo)).is_none());
    }

    #[test]
    fn test_contact_capture_suppresses_questions() {
        // "Oficinas" would otherwise hit the about entry
        assert!(intercept("Calle Oficinas 12, Los Angeles", at(Step::AskAddress)).is_none());
        assert!(intercept("ayuda@example.com", at(Step::AskEmail)).is_none());

        let manual = InterceptScope {
            step: Step::CollectVehicleInfo,
            manual_entry: true,
            quick_reply: false,
        };
        assert!(intercept("Sport Utility", manual).is_none());

        // handoff and small talk stay active
        assert!(matches!(
            intercept("quiero un asesor", at(Step::AskName)),
            Some(Interception::Handoff)
        ));
        assert!(matches!(
            intercept("gracias", at(Step::AskPhone)),
            Some(Interception::SmallTalk(SmallTalk::Thanks))
        ));
    }

    #[test]
    fn test_quick_reply_skips_help_and_faq() {
        let scope = InterceptScope {
            step: Step::CollectVehicleInfo,
            manual_entry: false,
            quick_reply: true,
        };
        assert!(intercept("No tengo el VIN", scope).is_none());
        assert!(intercept("Descuentos 💸", scope).is_none());
    }

    #[test]
    fn test_small_talk_reply_comes_from_pool() {
        for _ in 0..20 {
            assert!(SmallTalk::Thanks.replies().contains(&SmallTalk::Thanks.reply()));
        }
    }
}
