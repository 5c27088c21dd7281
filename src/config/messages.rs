//! Assistant copy
//!
//! Every user-facing string the conversation emits. Strings that mention the
//! agency are rendered from [`AgencyInfo`].

use super::client::AgencyInfo;

pub const BACK_TO_START: &str = "Volver al inicio ⬅️";
pub const SEE_OTHER_POLICIES: &str = "Ver otra póliza 📋";
pub const SEE_POLICY_TYPES: &str = "Ver tipos de pólizas 📋";
pub const QUOTE_AUTO: &str = "Cotizar seguro de auto 🚗";
pub const TALK_TO_ADVISOR: &str = "Hablar con un asesor 👨‍💼";
pub const CONTINUE_QUOTE: &str = "Continuar cotización ▶️";
pub const NO_VIN: &str = "No tengo el VIN";
pub const REENTER_VIN: &str = "Reingresar VIN";
pub const CORRECT: &str = "Corregir";
pub const VIN_CONFIRMED: &str = "Sí, es correcto";
pub const RESUME_YES: &str = "Sí, retomar";
pub const RESUME_NO: &str = "No, empezar de nuevo";

pub const WELCOME_SUGGESTIONS: [&str; 5] = [
    QUOTE_AUTO,
    SEE_POLICY_TYPES,
    "¿Qué documentos necesito? 📄",
    "¿Qué puedo preguntar? ❓",
    "Oficinas y contacto 📍",
];

pub fn welcome(agency: &AgencyInfo) -> String {
    format!(
        "¡Hola! 👋 Soy {}, tu asistente virtual de {}. ¿En qué puedo ayudarte hoy? 😊",
        agency.assistant_name, agency.name
    )
}

// Policies

pub const POLICY_MENU_PROMPT: &str = "Selecciona una póliza para ver más información:";
pub const POLICY_MORE_INFO_PROMPT: &str = "¿Sobre cuál póliza te gustaría saber más?";
pub const POLICY_DETAIL_OPTIONS: [&str; 3] = [QUOTE_AUTO, SEE_OTHER_POLICIES, BACK_TO_START];

pub const AUTO_POLICY_INFO: &str = "🚗 Seguro de Auto\n\
Cobertura contra daños, robo, responsabilidad civil y asistencia en carretera. Opciones de deducible flexible y descuentos por buen historial.\n\
¿Qué deseas hacer ahora?";
pub const HOME_POLICY_INFO: &str = "🏠 Seguro de Hogar\n\
Protege tu vivienda y pertenencias frente a incendios, robos, responsabilidad civil y fenómenos naturales (según plan).\n\
¿Qué deseas hacer ahora?";
pub const LIFE_POLICY_INFO: &str = "👨‍👩‍👧 Seguro de Vida\n\
Apoyo financiero a tus beneficiarios, opciones temporales y vitalicias, riders por enfermedades graves.\n\
¿Qué deseas hacer ahora?";
pub const HEALTH_POLICY_INFO: &str = "🏥 Seguro de Salud\n\
Cobertura médica integral con redes hospitalarias, consultas, emergencias y medicamentos (según plan).\n\
¿Qué deseas hacer ahora?";

// Data capture

pub const ASK_NAME: &str = "¿Cuál es tu nombre completo?";
pub const ASK_EMAIL: &str = "¿Cuál es tu correo electrónico?";
pub const ASK_PHONE: &str = "¿Cuál es tu número de teléfono?";
pub const ASK_BIRTHDATE: &str = "¿Cuál es tu fecha de nacimiento? (DD/MM/AAAA)";
pub const ASK_ADDRESS: &str = "¿Cuál es tu dirección completa en California?";
pub const ASK_DOCUMENT: &str = "¿Cuál es tu número de identificación o licencia de conducir?";

pub fn greet_and_ask_email(name: &str) -> String {
    format!("¡Hola {}! {}", name, ASK_EMAIL)
}

pub fn ask_vehicle_count(max: usize) -> String {
    format!("¿Cuántos vehículos deseas asegurar? (Máximo {})", max)
}

pub const VIN_PROMPT_OPTIONS: [&str; 2] = [NO_VIN, BACK_TO_START];

pub fn ask_vehicle_vin(index: usize) -> String {
    format!(
        "Por favor ingresa el VIN del vehículo {} (o escribe 'no sé' si no lo tienes a mano)",
        index + 1
    )
}

pub fn ask_vehicle_year(index: usize) -> String {
    format!("¿De qué año es el vehículo {}?", index + 1)
}

pub fn ask_vehicle_make(index: usize) -> String {
    format!("¿Qué marca es el vehículo {}? (Ej: Toyota, Honda, etc.)", index + 1)
}

pub fn ask_vehicle_model(index: usize) -> String {
    format!("¿Qué modelo es el vehículo {}?", index + 1)
}

pub fn ask_vehicle_body_class(index: usize) -> String {
    format!(
        "¿Qué tipo de vehículo es el {}? (Ej: Sedán, Camioneta, SUV, etc.)",
        index + 1
    )
}

pub const FINISH: &str = "¡Listo! Hemos recibido tu solicitud. Uno de nuestros agentes se pondrá en contacto contigo en breve para finalizar el proceso. ¿Hay algo más en lo que pueda ayudarte?";
pub const PROCESSING: &str = "Estamos procesando tu solicitud. Por favor, espera un momento.";

// Validation errors

pub const INVALID_EMAIL: &str = "Por favor ingresa un correo electrónico válido.";
pub const INVALID_PHONE: &str = "Por favor ingresa un número de teléfono válido.";
pub const INVALID_BIRTHDATE: &str = "Por favor ingresa una fecha de nacimiento válida (DD/MM/AAAA).";
pub const INVALID_YEAR: &str = "Por favor ingresa un año válido (ej: 2020).";

pub fn invalid_vehicle_count(max: usize) -> String {
    format!("Por favor ingresa un número entre 1 y {}.", max)
}

// VIN flow

pub const VIN_FILLERS: [&str; 3] = [
    "¡Súper, gracias por el VIN! Dame 2 seg…",
    "Perfecto, estoy revisándolo…",
    "Recibido, analizando el VIN…",
];

pub fn vehicle_identified(line: &str) -> String {
    format!("Perfecto, he identificado tu vehículo:\n{}", line)
}

pub const VIN_MATCH_PROMPT: &str = "¿Esto coincide?";
pub const VIN_MATCH_OPTIONS: [&str; 2] = [VIN_CONFIRMED, CORRECT];

pub const DECODE_FAILED: &str = "No pude decodificar el VIN. Continuemos con la información manual.";
pub const INVALID_VIN: &str = "El VIN debe tener 17 caracteres y no contener I, O o Q. Intenta nuevamente.";

pub const VIN_HELP: &str = "Sin el VIN puedo darte tips para encontrarlo:\n\n\
• En el tablero, lado del conductor (visible desde el parabrisas).\n\
• En el marco de la puerta del conductor.\n\
• En la tarjeta o registro del vehículo.\n\n\
Cuando lo tengas, ingrésalo aquí. Si prefieres, puedo conectarte con un asesor.";
pub const VIN_HELP_OPTIONS: [&str; 3] = [REENTER_VIN, TALK_TO_ADVISOR, BACK_TO_START];

// Quote

pub fn quote_summary(vehicle_lines: &str, price: &str) -> String {
    format!(
        "¡Gracias por la información! Aquí tienes tu resumen:\n\n\
         {}\n\n\
         💰 Precio estimado mensual: {}\n\n\
         ℹ️ Estimación no vinculante; sujeta a aseguradora, estado y verificación. Tratamos tus datos según nuestra política de privacidad.\n\n\
         ¿Te gustaría proceder con esta cotización?",
        vehicle_lines, price
    )
}

pub const QUOTE_OPTIONS: [&str; 3] = ["Sí, continuar", "No, volver a cotizar", TALK_TO_ADVISOR];
pub const CONFIRM_QUOTE_AGAIN: &str = "¿Te gustaría proceder con esta cotización?";
pub const QUOTE_DECLINED: &str = "De acuerdo. ¿Deseas hacer otra cotización o necesitas ayuda con algo más?";

// Interceptors

pub const HANDOFF: &str = "Listo, te conecto con un asesor. Te escribirán en breve. ¿Deseas hacer algo más mientras tanto?";
pub const HANDOFF_OPTIONS: [&str; 2] = [BACK_TO_START, CONTINUE_QUOTE];

pub const HELP_VIN_TIP: &str = "Para encontrar el VIN: en el tablero (lado conductor), marco de la puerta del conductor, o en el registro del vehículo.";
pub const HELP_TIP: &str = "Puedo guiarte paso a paso. Si quieres, también puedo conectarte con un asesor.";
pub const HELP_OPTIONS: [&str; 3] = [CONTINUE_QUOTE, TALK_TO_ADVISOR, BACK_TO_START];

pub const QUOTE_STATUS: &str = "Gracias por avisar. Usualmente te contactamos en 24–48h hábiles tras enviar la solicitud. Si lo prefieres, puedo escalar tu caso a un asesor ahora mismo.";
pub const QUOTE_STATUS_OPTIONS: [&str; 2] = [TALK_TO_ADVISOR, BACK_TO_START];

pub const FAQ_OPTIONS_VIN_FLOW: [&str; 3] = [CONTINUE_QUOTE, SEE_OTHER_POLICIES, BACK_TO_START];
pub const FAQ_OPTIONS_DEFAULT: [&str; 3] = [QUOTE_AUTO, SEE_OTHER_POLICIES, BACK_TO_START];

pub const SMALL_TALK_GREETING: [&str; 3] = [
    "¡Hola! 😊",
    "¡Hola! ¿Cómo te ayudo?",
    "¡Hola! Estoy aquí para ayudarte.",
];
pub const SMALL_TALK_THANKS: [&str; 3] = [
    "¡Con gusto! 🙌",
    "¡Para eso estoy! 😊",
    "¡De nada! ¿Seguimos?",
];
pub const SMALL_TALK_ACK: [&str; 3] = ["Perfecto. 👍", "Listo, seguimos. 👌", "Entendido. ✅"];
pub const SMALL_TALK_YES: [&str; 3] = [
    "¡Genial! 😊",
    "Perfecto, avancemos. 🚀",
    "Excelente, continúo. ✅",
];
pub const SMALL_TALK_NO: [&str; 3] = [
    "De acuerdo. 🤝",
    "Ok, dime cómo prefieres seguir. 🙂",
    "Está bien, te escucho. 👂",
];

// Quick replies

pub const DOCUMENTS: &str = "Para cotizar tu seguro, necesitarás los siguientes documentos:\n\n\
📝 Identificación oficial (INE o pasaporte)\n\
🚗 Para seguros de auto: licencia de conducir y tarjeta de circulación\n\
🏠 Para seguros de hogar: comprobante de domicilio y escrituras (si aplica)\n\n\
¿Deseas continuar?";
pub const DOCUMENTS_OPTIONS: [&str; 2] = [QUOTE_AUTO, BACK_TO_START];

pub fn whatsapp(agency: &AgencyInfo) -> String {
    format!(
        "Escríbenos a WhatsApp: {}\nEnlace: https://wa.me/{}",
        agency.whatsapp,
        agency.whatsapp_digits()
    )
}

pub const RESUME_OFFER: &str = "Veo una cotización pendiente. ¿Quieres retomar donde te quedaste?";
pub const RESUME_OPTIONS: [&str; 2] = [RESUME_YES, RESUME_NO];
pub const RESUMED: &str = "Perfecto, retomamos donde lo dejaste. 😊";

pub const FALLBACK_UNSURE: &str = "No estoy seguro de cómo responder a eso. ¿Podrías reformular tu pregunta?";
pub const GENERIC_ERROR: &str = "Lo siento, ha ocurrido un error. Por favor, inténtalo de nuevo más tarde.";
