//! Knowledge base for common questions
//!
//! A fixed, ordered table of entries. Resolution scans entries in
//! declaration order and returns the first whose trigger phrase is contained
//! in the (lowercased, trimmed) input.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Auto,
    Home,
    Life,
    Health,
    General,
    About,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaqEntry {
    pub id: &'static str,
    pub scope: Scope,
    /// Lowercase trigger phrases
    pub triggers: &'static [&'static str],
    pub answer: &'static str,
    /// Suggested quick replies; empty means the caller picks defaults
    pub options: &'static [&'static str],
}

const ABOUT_ANSWER: &str = "Somos Intercoast Insurance. Estamos en South Gate y Compton y te ayudamos a asegurar tu auto en California de forma clara y rápida. 😊\n\n\
• General Manager: Alejandro Quimbaya Tobón\n\
• Oficinas: 5863 Imperial Hwy (South Gate) · 920 N Long Beach Blvd I (Compton)\n\
• Teléfonos: +1 (562) 381-2012 · +1 (424) 417-1700 · WhatsApp: +1 (775) 675-4559\n\
• Idiomas: Español (atención bilingüe)\n\n\
¿Te paso la info completa o prefieres que coticemos de una vez?";

const ABOUT_ANSWER_EXTENDED: &str = "🏢 Intercoast Insurance es una agencia de seguros con presencia en South Gate y Compton dedicada a facilitarte la vida al asegurar tu vehículo en California. Creemos en la claridad, la cercanía y la rapidez: comparamos opciones entre diversas aseguradoras, te explicamos cada cobertura en español y priorizamos precios competitivos (especialmente en Liability) para que tomes decisiones informadas sin complicaciones.\n\n\
Te acompañamos en renovaciones, identificando oportunidades de descuento (multi-auto, buen historial, pago automático, etc.) y evitando lapsos de cobertura que puedan elevar tu prima. Cuando corresponde, te asesoramos en SR-22. Nuestro proceso es ágil: contacto → verificación → comparación → pago → documentos digitales.\n\n\
Operamos desde: 5863 Imperial Hwy, South Gate, CA 90280 y 920 N Long Beach Blvd I, Compton, CA 90221.\n\
General Manager: Alejandro Quimbaya Tobón.\n\
Tel: +1 (562) 381-2012 · +1 (424) 417-1700 · WhatsApp: +1 (775) 675-4559.\n\
Nota: Coberturas y precios están sujetos a aprobación de la aseguradora y a la normativa del estado.";

const HELP_INDEX_ANSWER: &str = "Puedo ayudarte con varias cosas. Aquí tienes ideas de preguntas (puedes escribirlas tal cual):\n\n\
❓ Cotización: \"Quiero cotizar un seguro de auto\"\n\
💸 Descuentos: \"¿Qué descuentos aplican?\"\n\
📄 Renovaciones/SR-22: \"¿Me ayudan a renovar?\" / \"¿Tramitan SR-22?\"\n\
🆘 Siniestros: \"¿Cómo reporto un siniestro?\"\n\
📍 Oficinas/Contacto: \"¿Dónde están?\" / \"¿Teléfono?\"\n\
📋 Requisitos: \"¿Qué documentos necesito?\"";

const fn entry(
    id: &'static str,
    scope: Scope,
    triggers: &'static [&'static str],
    answer: &'static str,
    options: &'static [&'static str],
) -> FaqEntry {
    FaqEntry {
        id,
        scope,
        triggers,
        answer,
        options,
    }
}

pub static FAQ: &[FaqEntry] = &[
    entry(
        "about",
        Scope::About,
        &[
            "quienes son", "quiénes son", "quien es intercoast", "intercoast insurance", "about",
            "quienes somos", "quiénes somos", "dirección", "direccion", "teléfono", "telefono",
            "whatsapp", "oficinas", "horarios", "general manager", "alejandro quimbaya",
        ],
        ABOUT_ANSWER,
        &[
            "Ver versión extendida 📄", "Llamar 📞", "WhatsApp 💬", "Cotizar seguro de auto 🚗",
            "Ver tipos de pólizas 📋", "¿Qué puedo preguntar? ❓", "Volver al inicio ⬅️",
        ],
    ),
    entry(
        "about-extended",
        Scope::About,
        &[
            "version extendida", "versión extendida", "ver más detalles", "ver mas detalles",
            "más info", "mas info",
        ],
        ABOUT_ANSWER_EXTENDED,
        &[
            "Llamar 📞", "WhatsApp 💬", "Cotizar seguro de auto 🚗", "¿Qué puedo preguntar? ❓",
            "Volver al inicio ⬅️",
        ],
    ),
    entry(
        "help-index",
        Scope::General,
        &[
            "que puedo preguntar", "qué puedo preguntar", "ayuda", "faq", "preguntas frecuentes",
            "temas", "opciones", "menu de ayuda", "menú de ayuda", "que hace eva", "qué hace eva",
        ],
        HELP_INDEX_ANSWER,
        &[
            "Cotizar seguro de auto 🚗", "Descuentos 💸", "Renovaciones/SR-22 📄",
            "Oficinas/Contacto 📍", "Reportar siniestro 🆘", "Volver al inicio ⬅️",
        ],
    ),
    entry(
        "discounts",
        Scope::Auto,
        &[
            "descuentos", "descuento", "multi-auto", "multi auto", "buen historial",
            "pago automático", "pago automatico", "estudiante", "buen conductor",
        ],
        "Buscamos ahorros con: multi-auto, buen historial, pago automático y otros según aseguradora. Te mostramos el impacto en tu cotización para decidir juntos.",
        &["¿Cotizamos con descuentos? 💸", "Ver tipos de pólizas 📋", "Volver al inicio ⬅️"],
    ),
    entry(
        "renewals",
        Scope::Auto,
        &[
            "renovaciones", "renovar", "renovación", "renovacion", "vencimiento", "lapse",
            "cambiar aseguradora", "cambiar de aseguradora",
        ],
        "Te ayudamos a renovar revisando coberturas y comparando entre aseguradoras para evitar lapsos que suben la prima. Si conviene cambiar de compañía, te lo proponemos.",
        &["Cotizar renovación 🔄", "SR-22 📄", "Llamar 📞", "WhatsApp 💬", "Volver al inicio ⬅️"],
    ),
    entry(
        "auto-coverages",
        Scope::Auto,
        &[
            "qué cubre auto", "que cubre auto", "cobertura auto", "cubre mi auto",
            "que incluye el seguro de auto",
        ],
        "Cobertura típica: responsabilidad civil (terceros), daños al vehículo (según plan), robo y asistencia en carretera. Te detallo límites y deducibles en tu propuesta.",
        &[],
    ),
    entry(
        "auto-exclusions",
        Scope::Auto,
        &[
            "qué no cubre auto", "no cubre auto", "exclusiones auto",
            "que no cubre el seguro de auto",
        ],
        "No cubre desgaste mecánico, carreras, conductor sin licencia válida, ni eventos fuera del plan. Las exclusiones exactas dependen de la aseguradora.",
        &[],
    ),
    entry(
        "sr22",
        Scope::Auto,
        &["sr-22", "sr22", "sr 22"],
        "Podemos asesorarte en SR-22 cuando corresponde. Lo incluimos en tu propuesta y te guiamos en el proceso.",
        &[],
    ),
    entry(
        "foreign-license",
        Scope::Auto,
        &["licencia extranjera", "licencia de otro país", "sin licencia usa"],
        "En muchos casos puedes asegurar con licencia extranjera vigente. Verificamos con la aseguradora al armar tu propuesta.",
        &[],
    ),
    entry(
        "report-claim",
        Scope::General,
        &[
            "reporte siniestro", "reporto siniestro", "reportar siniestro",
            "cómo reporto siniestro", "como reporto siniestro",
        ],
        "Te entregamos un número 24/7 y tu póliza digital. Si ocurre un siniestro, te guío desde aquí o puedes llamar a asistencia.",
        &[],
    ),
    entry(
        "multi-vehicle-discount",
        Scope::Auto,
        &["descuento varios autos", "varios autos descuento", "multi auto"],
        "Sí, aplicamos descuento progresivo por múltiples vehículos y te mostramos el total combinado con el ahorro.",
        &[],
    ),
    entry(
        "home-catastrophe",
        Scope::Home,
        &["sismo", "inundación", "inundacion", "catastrofica"],
        "Depende del plan/aseguradora. Hay añadidos catastróficos. Si te interesa, lo incluyo en la propuesta.",
        &[],
    ),
    entry(
        "home-offsite",
        Scope::Home,
        &["bienes portátiles", "fuera de casa", "portatiles"],
        "Algunos planes cubren bienes fuera del hogar con sublímites. Puedo proponerte un plan con esta extensión.",
        &[],
    ),
    entry(
        "home-requirements",
        Scope::Home,
        &["rejas", "alarmas", "requisitos hogar"],
        "Varias aseguradoras mejoran tarifa si hay rejas, alarmas o medidas de seguridad. Lo reflejo en tu propuesta si aplica.",
        &[],
    ),
    entry(
        "life-preexist",
        Scope::Life,
        &["beneficiarios", "carencia", "preexistencias vida"],
        "Puedes asignar beneficiarios libremente. Puede haber periodos de carencia y evaluación de preexistencias según el plan.",
        &[],
    ),
    entry(
        "health-network",
        Scope::Health,
        &[
            "red de clínicas", "red de clinicas", "clínicas", "clinicas", "preexistencias",
            "copago", "copagos", "deducible salud",
        ],
        "La red y condiciones (copagos/deducibles) dependen del plan. Al confirmar interés, te paso la red vigente y detallo condiciones.",
        &[],
    ),
    entry(
        "payment-monthly",
        Scope::General,
        &["pagar mensual", "pago mensual", "mensualidades"],
        "En la mayoría de pólizas puedes pagar mensual con tarjeta o débito automático. Te muestro opciones al confirmar.",
        &[],
    ),
    entry(
        "deductible",
        Scope::General,
        &["hay deducible", "deducible"],
        "Daños propios normalmente tiene deducible; responsabilidad civil (terceros) usualmente no. Te indico el detalle en la propuesta.",
        &[],
    ),
    entry(
        "issuance-time",
        Scope::General,
        &["cuánto tarda", "cuanto tarda", "tarda la emisión", "tarda la emision"],
        "Usualmente 24–48h hábiles tras confirmar datos y pago. Si urge, priorizo tu caso.",
        &[],
    ),
    entry(
        "no-vin",
        Scope::Auto,
        &["no tengo el vin", "sin vin", "no se vin", "no sé vin"],
        "Sin el VIN el precio es tentativo. Ubicaciones: tablero (lado conductor), marco de la puerta del conductor, y registro del vehículo. Cuando lo tengas, lo ajustamos.",
        &[],
    ),
];

/// First entry whose trigger is a substring of `input`
pub fn resolve(input: &str) -> Option<&'static FaqEntry> {
    let q = input.trim().to_lowercase();
    if q.is_empty() {
        return None;
    }
    FAQ.iter()
        .find(|entry| entry.triggers.iter().any(|t| q.contains(t)))
}

pub fn find(id: &str) -> Option<&'static FaqEntry> {
    FAQ.iter().find(|entry| entry.id == id)
}

impl FaqEntry {
    /// Entries that read as an introduction get a warmer lead-in
    pub fn lead_in(&self) -> &'static str {
        match self.id {
            "about" | "help-index" => "¡Claro! ",
            _ => "Claro, ",
        }
    }
}
