//! Quick-reply chips with dedicated handlers
//!
//! Matching is exact on the rendered label so a chip's intent never has to be
//! re-derived from free text.

use crate::config::messages;

use super::state::PolicyKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickReply {
    StartQuote,
    PolicyMenu,
    Policy(PolicyKind),
    Documents,
    HelpIndex,
    Offices,
    ExtendedAbout,
    Discounts,
    Renewals,
    WhatsApp,
    VinHelp,
    ReenterVin,
    VinConfirmed,
    ContinueQuote,
    Resume,
}

impl QuickReply {
    pub fn parse(label: &str) -> Option<Self> {
        if let Some(kind) = PolicyKind::from_label(label) {
            return Some(QuickReply::Policy(kind));
        }

        let reply = match label {
            messages::QUOTE_AUTO | "Cotizar renovación 🔄" | "¿Cotizamos con descuentos? 💸" => {
                QuickReply::StartQuote
            }
            messages::SEE_POLICY_TYPES | messages::SEE_OTHER_POLICIES => QuickReply::PolicyMenu,
            "¿Qué documentos necesito? 📄" => QuickReply::Documents,
            "¿Qué puedo preguntar? ❓" => QuickReply::HelpIndex,
            "Oficinas y contacto 📍" => QuickReply::Offices,
            "Ver versión extendida 📄" => QuickReply::ExtendedAbout,
            "Descuentos 💸" => QuickReply::Discounts,
            "Renovaciones/SR-22 📄" => QuickReply::Renewals,
            "WhatsApp 💬" => QuickReply::WhatsApp,
            messages::NO_VIN => QuickReply::VinHelp,
            messages::REENTER_VIN | messages::CORRECT => QuickReply::ReenterVin,
            messages::VIN_CONFIRMED => QuickReply::VinConfirmed,
            messages::CONTINUE_QUOTE => QuickReply::ContinueQuote,
            messages::RESUME_YES => QuickReply::Resume,
            _ => return None,
        };
        Some(reply)
    }

    /// Knowledge-base entry behind an informational chip, with its lead-in
    pub fn faq_source(self) -> Option<(&'static str, &'static str)> {
        match self {
            QuickReply::HelpIndex => Some(("help-index", "¡Claro! ")),
            QuickReply::Offices => Some(("about", "¡Claro! ")),
            QuickReply::ExtendedAbout => Some(("about-extended", "")),
            QuickReply::Discounts => Some(("discounts", "¡Buen punto! ")),
            QuickReply::Renewals => Some(("renewals", "Te cuento: ")),
            _ => None,
        }
    }
}
