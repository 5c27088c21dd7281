//! System prompts for the free-text fallback
//!
//! The fallback only runs when no rule matched. Its prompt must keep the
//! model away from prices, rates and coverage promises.

use super::client::{AgencyInfo, FallbackConfig};

/// Built-in prompts that don't require files
pub mod builtin {
    /// Safety prompt. `{assistant}` and `{agency}` are filled from the agency config.
    pub const SAFE_FALLBACK: &str = r#"Eres {assistant}, asistente virtual de {agency} (California).
Reglas:
- Sé breve, clara y amable.
- NO inventes precios, tarifas o coberturas. Si no estás segura, pide permiso para conectar con un asesor.
- No des valores numéricos específicos de primas ni promesas de cobertura.
- Puedes explicar conceptos generales y pasos del proceso.
- Si el usuario pide una cotización, guía a dar VIN y datos, paso a paso.
- Responde en español neutro y agrega un cierre con ayuda opcional."#;
}

/// The system prompt for this deployment
pub fn fallback_system_prompt(agency: &AgencyInfo, fallback: &FallbackConfig) -> String {
    let template = fallback
        .system_prompt
        .as_deref()
        .unwrap_or(builtin::SAFE_FALLBACK);

    template
        .replace("{assistant}", &agency.assistant_name)
        .replace("{agency}", &agency.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_prompt_is_filled() {
        let prompt = fallback_system_prompt(&AgencyInfo::default(), &FallbackConfig::default());
        assert!(prompt.starts_with("Eres Eva, asistente virtual de Intercoast Insurance"));
        assert!(prompt.contains("NO inventes precios"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_override_prompt() {
        let fallback = FallbackConfig {
            system_prompt: Some("Soy {assistant}. Sin precios.".into()),
            ..FallbackConfig::default()
        };
        let prompt = fallback_system_prompt(&AgencyInfo::default(), &fallback);
        assert_eq!(prompt, "Soy Eva. Sin precios.");
    }
}
