//! Conversation engine
//!
//! `process_turn` is a pure step function over `UserData` apart from its
//! collaborators: at most one VIN decode, at most one lead dispatch and any
//! number of presentation events per turn. Persisting the returned state is
//! the session's job.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use tokio::task::JoinHandle;

use crate::config::{messages, AgencyConfig};
use crate::conversation::ChatMessage;
use crate::leads::{LeadDispatcher, LeadOutcome, LeadPayload};
use crate::pricing::{format_usd, quote_fleet};
use crate::providers::FallbackResponder;
use crate::vin::{is_valid_vin, normalize_vin, VinDecoder};

use super::events::{ChatEvent, EventBus, Mood};
use super::interceptors::{self, InterceptScope, Interception, SmallTalk};
use super::quick_replies::QuickReply;
use super::state::{ManualField, PolicyKind, Step, UserData};
use super::validation;

/// Per-turn context supplied by the session
pub struct TurnContext<'a> {
    pub conversation_id: &'a str,
    /// Transcript so far, including the user message being processed
    pub history: &'a [ChatMessage],
    pub events: &'a EventBus,
}

/// What the session should do with its snapshots after the turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Persistence {
    #[default]
    Live,
    /// Keep the pre-turn state as the abandoned snapshot
    Abandon,
    /// Replace the state with the resumable snapshot
    Resume,
    DiscardSnapshots,
}

#[derive(Debug)]
pub struct TurnResult {
    pub state: UserData,
    pub messages: Vec<ChatMessage>,
    pub mood: Option<Mood>,
    pub persistence: Persistence,
    pub lead: Option<JoinHandle<LeadOutcome>>,
    /// The visitor started over; the next quote is a new conversation
    pub fresh_conversation: bool,
}

impl TurnResult {
    fn new(state: UserData) -> Self {
        Self {
            state,
            messages: Vec::new(),
            mood: None,
            persistence: Persistence::Live,
            lead: None,
            fresh_conversation: false,
        }
    }

    fn say(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(text));
    }

    fn suggest<I, S>(&mut self, text: impl Into<String>, options: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.messages.push(ChatMessage::suggestion(text, options));
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }
}

pub struct ConversationEngine {
    agency: Arc<AgencyConfig>,
    decoder: Arc<dyn VinDecoder>,
    leads: Arc<LeadDispatcher>,
    fallback: Arc<dyn FallbackResponder>,
}

impl ConversationEngine {
    pub fn new(
        agency: Arc<AgencyConfig>,
        decoder: Arc<dyn VinDecoder>,
        leads: Arc<LeadDispatcher>,
        fallback: Arc<dyn FallbackResponder>,
    ) -> Self {
        Self {
            agency,
            decoder,
            leads,
            fallback,
        }
    }

    pub fn agency(&self) -> &AgencyConfig {
        &self.agency
    }

    pub fn welcome(&self) -> ChatMessage {
        ChatMessage::suggestion(
            messages::welcome(&self.agency.agency),
            messages::WELCOME_SUGGESTIONS,
        )
    }

    /// Process one user turn against `state`
    pub async fn process_turn(
        &self,
        input: &str,
        state: &UserData,
        ctx: &TurnContext<'_>,
    ) -> TurnResult {
        let input = input.trim();
        let mut out = TurnResult::new(state.clone());
        let quick_reply = QuickReply::parse(input);

        let scope = InterceptScope {
            step: state.current_step,
            manual_entry: state.current_step == Step::CollectVehicleInfo
                && state.manual_field.is_some(),
            quick_reply: quick_reply.is_some(),
        };

        if let Some(hit) = interceptors::intercept(input, scope) {
            self.intercepted(hit, input, &mut out, ctx);
        } else if let Some(reply) = quick_reply {
            self.quick_reply(reply, &mut out, ctx);
        } else {
            let from = state.current_step;
            self.step(input, &mut out, ctx).await;

            let to = out.state.current_step;
            if !from.can_transition_to(to) {
                tracing::warn!(
                    conversation_id = ctx.conversation_id,
                    from = from.as_str(),
                    to = to.as_str(),
                    "Unexpected step transition"
                );
            }
        }

        out
    }

    /// Restore a snapshot and re-ask its pending question. With nothing to
    /// restore the visitor gets the welcome instead.
    pub fn resume(&self, snapshot: Option<UserData>) -> TurnResult {
        let Some(state) = snapshot else {
            let mut out = TurnResult::new(UserData::new());
            out.push(self.welcome());
            return out;
        };

        tracing::info!(step = state.current_step.as_str(), "Resuming conversation");
        let prompt = self.prompt_for(&state);
        let mut out = TurnResult::new(state);
        out.say(messages::RESUMED);
        out.push(prompt);
        out
    }

    /// The question the given state is waiting on
    pub fn prompt_for(&self, state: &UserData) -> ChatMessage {
        let idx = state.vehicle_index();
        let max = self.agency.chat.max_vehicles;

        match state.current_step {
            Step::Welcome | Step::Finish => self.welcome(),
            Step::PolicyMenu => {
                ChatMessage::suggestion(messages::POLICY_MENU_PROMPT, PolicyKind::menu_options())
            }
            Step::PolicyDetail => match state.selected_policy {
                Some(kind) => ChatMessage::suggestion(kind.detail(), messages::POLICY_DETAIL_OPTIONS),
                None => ChatMessage::suggestion(
                    messages::POLICY_MENU_PROMPT,
                    PolicyKind::menu_options(),
                ),
            },
            Step::AskVehicleCount => ChatMessage::assistant(messages::ask_vehicle_count(max)),
            Step::AskBirthdate => ChatMessage::assistant(messages::ASK_BIRTHDATE),
            Step::CollectVehicleInfo => match state.manual_field {
                Some(field) => ChatMessage::assistant(manual_prompt(field, idx)),
                None => ChatMessage::suggestion(
                    messages::ask_vehicle_vin(idx),
                    messages::VIN_PROMPT_OPTIONS,
                ),
            },
            Step::ConfirmQuote => {
                let total = state
                    .quote_amount
                    .unwrap_or_else(|| quote_fleet(&state.vehicles).total);
                ChatMessage::suggestion(
                    messages::quote_summary(&summary_lines(state), &format_usd(total)),
                    messages::QUOTE_OPTIONS,
                )
            }
            Step::AskName => ChatMessage::assistant(messages::ASK_NAME),
            Step::AskEmail => ChatMessage::assistant(messages::ASK_EMAIL),
            Step::AskPhone => ChatMessage::assistant(messages::ASK_PHONE),
            Step::AskAddress => ChatMessage::assistant(messages::ASK_ADDRESS),
            Step::AskDocument => ChatMessage::assistant(messages::ASK_DOCUMENT),
        }
    }

    fn intercepted(
        &self,
        hit: Interception,
        input: &str,
        out: &mut TurnResult,
        ctx: &TurnContext<'_>,
    ) {
        let step = out.state.current_step;
        match hit {
            Interception::Handoff => {
                tracing::info!(
                    event = "handoff",
                    conversation_id = ctx.conversation_id,
                    step = step.as_str(),
                    "Handoff to advisor requested"
                );
                ctx.events.publish(ChatEvent::Handoff {
                    reason: input.to_string(),
                    step,
                    conversation_id: ctx.conversation_id.to_string(),
                });
                out.suggest(messages::HANDOFF, messages::HANDOFF_OPTIONS);
            }
            Interception::Restart => {
                tracing::info!(
                    event = "abandoned_step",
                    conversation_id = ctx.conversation_id,
                    step = step.as_str(),
                    "Conversation restarted"
                );
                out.persistence = if step.is_resumable() {
                    Persistence::Abandon
                } else {
                    Persistence::DiscardSnapshots
                };
                out.state = UserData::new();
                out.fresh_conversation = true;
                out.push(self.welcome());
            }
            Interception::Help => {
                let tip = if step == Step::CollectVehicleInfo {
                    messages::HELP_VIN_TIP
                } else {
                    messages::HELP_TIP
                };
                out.suggest(tip, messages::HELP_OPTIONS);
            }
            Interception::QuoteStatus => {
                out.suggest(messages::QUOTE_STATUS, messages::QUOTE_STATUS_OPTIONS);
            }
            Interception::SmallTalk(talk) => out.say(talk.reply()),
            Interception::Faq(entry) => {
                tracing::debug!(
                    conversation_id = ctx.conversation_id,
                    faq = entry.id,
                    "Answered from knowledge base"
                );
                let text = format!("{}{}", entry.lead_in(), entry.answer);
                if !entry.options.is_empty() {
                    out.suggest(text, entry.options.iter().copied());
                } else if step == Step::CollectVehicleInfo {
                    out.suggest(text, messages::FAQ_OPTIONS_VIN_FLOW);
                } else {
                    out.suggest(text, messages::FAQ_OPTIONS_DEFAULT);
                }
            }
        }
    }

    fn quick_reply(&self, reply: QuickReply, out: &mut TurnResult, ctx: &TurnContext<'_>) {
        match reply {
            QuickReply::StartQuote => self.start_quote(out),
            QuickReply::PolicyMenu => self.policy_menu(out, ctx),
            QuickReply::Policy(kind) => self.policy_detail(kind, out),
            QuickReply::Documents => self.documents(out),
            QuickReply::WhatsApp => {
                out.suggest(messages::whatsapp(&self.agency.agency), [messages::BACK_TO_START]);
            }
            QuickReply::VinHelp => self.vin_help(out, ctx),
            QuickReply::ReenterVin => self.correct_vin(out),
            QuickReply::VinConfirmed => out.say(SmallTalk::Ack.reply()),
            QuickReply::ContinueQuote => match out.state.current_step {
                Step::Welcome | Step::PolicyMenu | Step::PolicyDetail | Step::Finish => {
                    self.start_quote(out)
                }
                _ => {
                    let prompt = self.prompt_for(&out.state);
                    out.push(prompt);
                }
            },
            QuickReply::Resume => out.persistence = Persistence::Resume,
            QuickReply::HelpIndex
            | QuickReply::Offices
            | QuickReply::ExtendedAbout
            | QuickReply::Discounts
            | QuickReply::Renewals => self.faq_chip(reply, out),
        }
    }

    fn faq_chip(&self, reply: QuickReply, out: &mut TurnResult) {
        let entry = reply
            .faq_source()
            .and_then(|(id, prefix)| crate::knowledge::find(id).map(|entry| (entry, prefix)));

        match entry {
            Some((entry, prefix)) => out.suggest(
                format!("{}{}", prefix, entry.answer),
                entry.options.iter().copied(),
            ),
            None => out.push(self.welcome()),
        }
    }

    async fn step(&self, input: &str, out: &mut TurnResult, ctx: &TurnContext<'_>) {
        let lower = input.to_lowercase();
        let max = self.agency.chat.max_vehicles;

        match out.state.current_step {
            Step::Welcome => {
                if ["cotiz", "precio", "auto"].iter().any(|k| lower.contains(k)) {
                    self.start_quote(out);
                } else if ["póliz", "poliz", "tipos"].iter().any(|k| lower.contains(k))
                    || (lower.contains("ver") && lower.contains("pol"))
                {
                    self.policy_menu(out, ctx);
                } else if lower.contains("document") || lower.contains("requisit") {
                    self.documents(out);
                } else {
                    out.push(self.welcome());
                }
            }

            Step::PolicyMenu => match PolicyKind::mentioned_in(&lower) {
                Some(kind) => self.policy_detail(kind, out),
                None => out.suggest(messages::POLICY_MORE_INFO_PROMPT, PolicyKind::menu_options()),
            },

            Step::PolicyDetail => {
                if lower.contains("ver otra") {
                    self.policy_menu(out, ctx);
                } else if lower.contains("cotizar") {
                    self.start_quote(out);
                } else {
                    out.state.current_step = Step::PolicyMenu;
                    out.suggest(messages::POLICY_MORE_INFO_PROMPT, PolicyKind::menu_options());
                }
            }

            Step::AskVehicleCount => match validation::parse_vehicle_count(input, max) {
                Some(count) => {
                    out.state.reset_vehicles(count);
                    out.state.current_step = Step::AskBirthdate;
                    out.say(messages::ASK_BIRTHDATE);
                }
                None => out.say(messages::invalid_vehicle_count(max)),
            },

            Step::AskBirthdate => {
                if validation::is_valid_birth_date(input) {
                    out.state.birth_date = Some(input.to_string());
                    out.state.current_step = Step::CollectVehicleInfo;
                    out.state.current_vehicle_index = 0;
                    out.suggest(messages::ask_vehicle_vin(0), messages::VIN_PROMPT_OPTIONS);
                } else {
                    out.say(messages::INVALID_BIRTHDATE);
                    out.mood = Some(Mood::Concerned);
                }
            }

            Step::CollectVehicleInfo => self.collect_vehicle_info(input, &lower, out, ctx).await,

            Step::ConfirmQuote => match validation::affirmation(input) {
                Some(true) => {
                    tracing::info!(
                        event = "quote_confirmed",
                        conversation_id = ctx.conversation_id,
                        total = out.state.quote_amount.unwrap_or_default(),
                        "Quote confirmed"
                    );
                    out.state.current_step = Step::AskName;
                    out.mood = Some(Mood::Happy);
                    out.say(messages::ASK_NAME);
                }
                Some(false) => {
                    out.state.current_step = Step::Finish;
                    out.persistence = Persistence::DiscardSnapshots;
                    out.say(messages::QUOTE_DECLINED);
                }
                None => out.suggest(messages::CONFIRM_QUOTE_AGAIN, messages::QUOTE_OPTIONS),
            },

            Step::AskName => {
                out.state.name = Some(input.to_string());
                out.state.current_step = Step::AskEmail;
                out.say(messages::greet_and_ask_email(input));
            }

            Step::AskEmail => {
                if validation::is_valid_email(input) {
                    out.state.email = Some(input.to_string());
                    out.state.current_step = Step::AskPhone;
                    out.say(messages::ASK_PHONE);
                } else {
                    out.say(messages::INVALID_EMAIL);
                }
            }

            Step::AskPhone => {
                if validation::is_valid_phone(input) {
                    out.state.phone = Some(input.to_string());
                    out.state.current_step = Step::AskAddress;
                    out.say(messages::ASK_ADDRESS);
                } else {
                    out.say(messages::INVALID_PHONE);
                }
            }

            Step::AskAddress => {
                out.state.address = Some(input.to_string());
                out.state.current_step = Step::AskDocument;
                out.say(messages::ASK_DOCUMENT);
            }

            Step::AskDocument => {
                out.state.document_number = Some(input.to_string());
                out.state.current_step = Step::Finish;
                out.persistence = Persistence::DiscardSnapshots;

                if out.state.lead_submitted || self.leads.was_dispatched(ctx.conversation_id).await
                {
                    out.say(messages::PROCESSING);
                    return;
                }

                out.state.lead_submitted = true;
                let lead = LeadPayload::from_user_data(&out.state, ctx.conversation_id);
                out.lead = self.leads.dispatch(lead).await;
                out.say(messages::FINISH);
            }

            Step::Finish => match self.fallback.respond(ctx.history, &out.state).await {
                Ok(reply) if !reply.is_empty() => out.say(reply),
                Ok(_) => out.say(messages::FALLBACK_UNSURE),
                Err(e) => {
                    tracing::warn!(
                        conversation_id = ctx.conversation_id,
                        error = %e,
                        "Fallback responder failed"
                    );
                    out.say(messages::FALLBACK_UNSURE);
                }
            },
        }
    }

    fn start_quote(&self, out: &mut TurnResult) {
        out.state.insurance_type = Some(PolicyKind::Auto);
        out.state.current_step = Step::AskVehicleCount;
        out.say(messages::ask_vehicle_count(self.agency.chat.max_vehicles));
    }

    fn policy_menu(&self, out: &mut TurnResult, ctx: &TurnContext<'_>) {
        tracing::info!(
            event = "policy_menu_opened",
            conversation_id = ctx.conversation_id,
            "Policy menu opened"
        );
        out.state.current_step = Step::PolicyMenu;
        out.suggest(messages::POLICY_MENU_PROMPT, PolicyKind::menu_options());
    }

    fn policy_detail(&self, kind: PolicyKind, out: &mut TurnResult) {
        out.state.selected_policy = Some(kind);
        out.state.current_step = Step::PolicyDetail;
        out.suggest(kind.detail(), messages::POLICY_DETAIL_OPTIONS);
    }

    fn documents(&self, out: &mut TurnResult) {
        out.state.current_step = Step::Welcome;
        out.suggest(messages::DOCUMENTS, messages::DOCUMENTS_OPTIONS);
    }

    fn vin_help(&self, out: &mut TurnResult, ctx: &TurnContext<'_>) {
        tracing::info!(
            event = "vin_help_shown",
            conversation_id = ctx.conversation_id,
            vehicle = out.state.vehicle_index() + 1,
            "VIN help shown"
        );
        out.suggest(messages::VIN_HELP, messages::VIN_HELP_OPTIONS);
    }

    /// Clear a vehicle and ask for its VIN again: the one being entered by
    /// hand, otherwise the last decoded one
    fn correct_vin(&self, out: &mut TurnResult) {
        if !matches!(
            out.state.current_step,
            Step::CollectVehicleInfo | Step::ConfirmQuote
        ) {
            let prompt = self.prompt_for(&out.state);
            out.push(prompt);
            return;
        }

        let idx = if out.state.manual_field.is_some() {
            out.state.vehicle_index()
        } else {
            out.state
                .last_decoded_index
                .filter(|i| *i < out.state.vehicles.len())
                .unwrap_or_else(|| out.state.vehicle_index())
        };

        if let Some(vehicle) = out.state.vehicles.get_mut(idx) {
            *vehicle = Default::default();
        }
        out.state.manual_field = None;
        out.state.quote_amount = None;
        out.state.last_decoded_index = None;
        out.state.current_vehicle_index = idx;
        out.state.current_step = Step::CollectVehicleInfo;
        out.suggest(messages::ask_vehicle_vin(idx), messages::VIN_PROMPT_OPTIONS);
    }

    async fn collect_vehicle_info(
        &self,
        input: &str,
        lower: &str,
        out: &mut TurnResult,
        ctx: &TurnContext<'_>,
    ) {
        if let Some(field) = out.state.manual_field {
            self.manual_entry(field, input, out, ctx);
            return;
        }

        if matches!(lower, "no sé" | "no se") || lower.contains("no tengo el vin") {
            self.vin_help(out, ctx);
            return;
        }

        let idx = out.state.vehicle_index();
        let vin = normalize_vin(input);
        let awaiting_vin = out
            .state
            .vehicles
            .get(idx)
            .is_some_and(|v| v.vin.is_none());

        if awaiting_vin && is_valid_vin(&vin) {
            self.decode_vin(vin, idx, out, ctx).await;
        } else {
            out.say(messages::INVALID_VIN);
            out.suggest(messages::ask_vehicle_vin(idx), messages::VIN_PROMPT_OPTIONS);
        }
    }

    async fn decode_vin(&self, vin: String, idx: usize, out: &mut TurnResult, ctx: &TurnContext<'_>) {
        tracing::info!(
            event = "vin_submitted",
            conversation_id = ctx.conversation_id,
            vehicle = idx + 1,
            vin = %vin,
            "VIN submitted"
        );

        let filler = messages::VIN_FILLERS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(messages::VIN_FILLERS[0]);
        out.say(filler);
        // Transient; the session publishes the settled mood after the turn.
        ctx.events.publish(ChatEvent::Mood(Mood::Thinking));

        match self.decoder.decode(&vin).await {
            Ok(attributes) => {
                tracing::info!(
                    event = "nhtsa_decode_ok",
                    conversation_id = ctx.conversation_id,
                    vin = %vin,
                    "VIN decoded"
                );
                let Some(vehicle) = out.state.vehicles.get_mut(idx) else {
                    return;
                };
                vehicle.apply_decoded(vin, attributes);
                tracing::info!(
                    event = "vehicle_decoded",
                    conversation_id = ctx.conversation_id,
                    vehicle = idx + 1,
                    year = %vehicle.attributes.year,
                    make = %vehicle.attributes.make,
                    model = %vehicle.attributes.model,
                    "Vehicle identified"
                );
                let line = vehicle.summary_line(idx);

                out.say(messages::vehicle_identified(&line));
                out.suggest(messages::VIN_MATCH_PROMPT, messages::VIN_MATCH_OPTIONS);
                out.state.last_decoded_index = Some(idx);
                out.mood = Some(Mood::Neutral);
                self.advance_vehicle(out, ctx);
            }
            Err(e) => {
                tracing::info!(
                    event = "nhtsa_decode_fail",
                    conversation_id = ctx.conversation_id,
                    vin = %vin,
                    error = %e,
                    "VIN decode failed, switching to manual entry"
                );
                if let Some(vehicle) = out.state.vehicles.get_mut(idx) {
                    vehicle.vin = Some(vin);
                }
                out.state.manual_field = Some(ManualField::Year);
                out.say(messages::DECODE_FAILED);
                out.say(manual_prompt(ManualField::Year, idx));
                out.mood = Some(Mood::Concerned);
            }
        }
    }

    fn manual_entry(
        &self,
        field: ManualField,
        input: &str,
        out: &mut TurnResult,
        ctx: &TurnContext<'_>,
    ) {
        let idx = out.state.vehicle_index();
        let Some(vehicle) = out.state.vehicles.get_mut(idx) else {
            out.state.manual_field = None;
            return;
        };
        let attrs = &mut vehicle.attributes;

        match field {
            ManualField::Year => match validation::parse_manual_year(input) {
                Some(year) => {
                    attrs.year = year.to_string();
                    out.state.manual_field = Some(ManualField::Make);
                    out.say(messages::ask_vehicle_make(idx));
                }
                None => {
                    out.say(messages::INVALID_YEAR);
                    out.mood = Some(Mood::Concerned);
                }
            },
            ManualField::Make => {
                attrs.make = input.to_string();
                out.state.manual_field = Some(ManualField::Model);
                out.say(messages::ask_vehicle_model(idx));
            }
            ManualField::Model => {
                attrs.model = input.to_string();
                out.state.manual_field = Some(ManualField::BodyClass);
                out.say(messages::ask_vehicle_body_class(idx));
            }
            ManualField::BodyClass => {
                attrs.body_class = validation::normalize_body_type(input);
                out.state.manual_field = None;
                tracing::info!(
                    event = "vehicle_entered_manually",
                    conversation_id = ctx.conversation_id,
                    vehicle = idx + 1,
                    "Vehicle captured manually"
                );
                self.advance_vehicle(out, ctx);
            }
        }
    }

    /// Move to the first vehicle not yet captured, or quote once all are.
    /// A vehicle that has a VIN but is missing data resumes manual entry.
    fn advance_vehicle(&self, out: &mut TurnResult, ctx: &TurnContext<'_>) {
        let Some(next) = out.state.next_incomplete_vehicle() else {
            self.show_quote(out, ctx);
            return;
        };

        out.state.current_vehicle_index = next;
        let vehicle = &out.state.vehicles[next];
        let pending = vehicle.missing_field().filter(|_| vehicle.vin.is_some());
        match pending {
            Some(field) => {
                out.state.manual_field = Some(field);
                out.say(manual_prompt(field, next));
            }
            None => out.suggest(messages::ask_vehicle_vin(next), messages::VIN_PROMPT_OPTIONS),
        }
    }

    fn show_quote(&self, out: &mut TurnResult, ctx: &TurnContext<'_>) {
        let quote = quote_fleet(&out.state.vehicles);
        tracing::info!(
            event = "quote_shown",
            conversation_id = ctx.conversation_id,
            vehicles = out.state.vehicles.len(),
            subtotal = quote.subtotal,
            discount = quote.discount,
            total = quote.total,
            "Quote shown"
        );

        out.state.quote_amount = Some(quote.total);
        out.state.current_vehicle_index = out.state.vehicles.len();
        out.state.current_step = Step::ConfirmQuote;
        out.suggest(
            messages::quote_summary(&summary_lines(&out.state), &format_usd(quote.total)),
            messages::QUOTE_OPTIONS,
        );
        out.mood = Some(Mood::Happy);
    }
}

fn manual_prompt(field: ManualField, idx: usize) -> String {
    match field {
        ManualField::Year => messages::ask_vehicle_year(idx),
        ManualField::Make => messages::ask_vehicle_make(idx),
        ManualField::Model => messages::ask_vehicle_model(idx),
        ManualField::BodyClass => messages::ask_vehicle_body_class(idx),
    }
}

fn summary_lines(state: &UserData) -> String {
    state
        .vehicles
        .iter()
        .enumerate()
        .map(|(i, v)| v.summary_line(i))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::testing::RecordingSubmitter;
    use crate::providers::testing::CannedFallback;
    use crate::core::state::Vehicle;
    use crate::vin::testing::{corolla, odyssey, FakeDecoder};

    const COROLLA_VIN: &str = "2T1BURHE0JC000001";
    const ODYSSEY_VIN: &str = "5FNRL6H78NB000002";
    const UNKNOWN_VIN: &str = "1HGCM82633A004352";

    struct Harness {
        engine: ConversationEngine,
        decoder: Arc<FakeDecoder>,
        submitter: Arc<RecordingSubmitter>,
        events: EventBus,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_fallback(CannedFallback(Some("Con gusto te ayudo.".into())))
        }

        fn with_fallback(fallback: CannedFallback) -> Self {
            let decoder = Arc::new(
                FakeDecoder::with(COROLLA_VIN, corolla()).insert(ODYSSEY_VIN, odyssey()),
            );
            let submitter = Arc::new(RecordingSubmitter::default());
            let engine = ConversationEngine::new(
                Arc::new(AgencyConfig::default()),
                decoder.clone(),
                Arc::new(LeadDispatcher::new(submitter.clone())),
                Arc::new(fallback),
            );
            Self {
                engine,
                decoder,
                submitter,
                events: EventBus::default(),
            }
        }

        async fn turn(&self, input: &str, state: &UserData) -> TurnResult {
            let ctx = TurnContext {
                conversation_id: "conv-1",
                history: &[],
                events: &self.events,
            };
            self.engine.process_turn(input, state, &ctx).await
        }
    }

    fn at(step: Step) -> UserData {
        UserData {
            current_step: step,
            ..UserData::new()
        }
    }

    fn collecting(count: usize) -> UserData {
        let mut state = at(Step::CollectVehicleInfo);
        state.reset_vehicles(count);
        state.birth_date = Some("01/02/1990".into());
        state
    }

    fn contents(result: &TurnResult) -> Vec<&str> {
        result.messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[tokio::test]
    async fn test_vehicle_count_initializes_fleet() {
        let h = Harness::new();
        let result = h.turn("3", &at(Step::AskVehicleCount)).await;

        assert_eq!(result.state.current_step, Step::AskBirthdate);
        assert_eq!(result.state.vehicles.len(), 3);
        assert!(result.state.vehicles.iter().all(|v| v.vin.is_none()));
        assert_eq!(contents(&result), vec![messages::ASK_BIRTHDATE]);
    }

    #[tokio::test]
    async fn test_invalid_input_does_not_advance() {
        let h = Harness::new();

        let result = h.turn("9", &at(Step::AskVehicleCount)).await;
        assert_eq!(result.state.current_step, Step::AskVehicleCount);
        assert_eq!(contents(&result), vec![messages::invalid_vehicle_count(5).as_str()]);

        let result = h.turn("31/02/2024", &at(Step::AskBirthdate)).await;
        assert_eq!(result.state.current_step, Step::AskBirthdate);
        assert_eq!(result.mood, Some(Mood::Concerned));

        let result = h.turn("ana@", &at(Step::AskEmail)).await;
        assert_eq!(result.state.current_step, Step::AskEmail);
        assert_eq!(contents(&result), vec![messages::INVALID_EMAIL]);
    }

    #[tokio::test]
    async fn test_single_vehicle_decode_shows_quote() {
        let h = Harness::new();
        let mut events = h.events.subscribe();
        let result = h.turn(COROLLA_VIN, &collecting(1)).await;

        assert_eq!(result.state.current_step, Step::ConfirmQuote);
        assert_eq!(result.state.vehicles[0].vin.as_deref(), Some(COROLLA_VIN));
        assert_eq!(result.state.vehicles[0].attributes.make, "TOYOTA");
        assert_eq!(result.state.last_decoded_index, Some(0));
        assert!(result.state.quote_amount.is_some());
        assert_eq!(result.mood, Some(Mood::Happy));

        // filler, identification, match prompt, quote
        assert_eq!(result.messages.len(), 4);
        assert!(messages::VIN_FILLERS.contains(&result.messages[0].content.as_str()));
        assert!(result.messages[1]
            .content
            .contains("• Vehículo 1: 2023 TOYOTA Corolla — Sedan/Saloon"));
        assert_eq!(result.messages[2].options(), messages::VIN_MATCH_OPTIONS);
        assert!(result.messages[3].content.contains("💰 Precio estimado mensual: $"));
        assert_eq!(result.messages[3].options(), messages::QUOTE_OPTIONS);

        assert_eq!(events.recv().await.unwrap(), ChatEvent::Mood(Mood::Thinking));
    }

    #[tokio::test]
    async fn test_fleet_moves_to_next_vehicle() {
        let h = Harness::new();
        let first = h.turn(&COROLLA_VIN.to_lowercase(), &collecting(2)).await;

        assert_eq!(first.state.current_step, Step::CollectVehicleInfo);
        assert_eq!(first.state.current_vehicle_index, 1);
        let last = first.messages.last().unwrap();
        assert_eq!(last.content, messages::ask_vehicle_vin(1));

        let second = h.turn(ODYSSEY_VIN, &first.state).await;
        assert_eq!(second.state.current_step, Step::ConfirmQuote);
        let quote = &second.messages.last().unwrap().content;
        assert!(quote.contains("• Vehículo 1: 2023 TOYOTA Corolla"));
        assert!(quote.contains("• Vehículo 2: 2023 HONDA Odyssey — Minivan"));
        assert_eq!(h.decoder.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalid_vin_reprompts() {
        let h = Harness::new();
        let result = h.turn("ABC123", &collecting(1)).await;

        assert_eq!(result.state.current_step, Step::CollectVehicleInfo);
        assert_eq!(result.messages[0].content, messages::INVALID_VIN);
        assert_eq!(result.messages[1].options(), messages::VIN_PROMPT_OPTIONS);
        assert_eq!(h.decoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_decode_failure_runs_manual_entry() {
        let h = Harness::new();
        let state = h.turn(UNKNOWN_VIN, &collecting(1)).await;
        assert_eq!(state.mood, Some(Mood::Concerned));
        assert_eq!(state.state.manual_field, Some(ManualField::Year));
        assert_eq!(state.state.vehicles[0].vin.as_deref(), Some(UNKNOWN_VIN));
        assert!(contents(&state).contains(&messages::DECODE_FAILED));

        let state = h.turn("20", &state.state).await;
        assert_eq!(contents(&state), vec![messages::INVALID_YEAR]);
        assert_eq!(state.state.manual_field, Some(ManualField::Year));

        let state = h.turn("2019", &state.state).await;
        assert_eq!(state.state.manual_field, Some(ManualField::Make));
        // "Honda" must not be swallowed by any interceptor
        let state = h.turn("Honda", &state.state).await;
        assert_eq!(state.state.manual_field, Some(ManualField::Model));
        let state = h.turn("Civic", &state.state).await;
        assert_eq!(state.state.manual_field, Some(ManualField::BodyClass));
        let state = h.turn("Sedán", &state.state).await;

        assert_eq!(state.state.current_step, Step::ConfirmQuote);
        assert_eq!(state.state.manual_field, None);
        let vehicle = &state.state.vehicles[0].attributes;
        assert_eq!(vehicle.year, "2019");
        assert_eq!(vehicle.make, "Honda");
        assert_eq!(vehicle.model, "Civic");
        assert_eq!(vehicle.body_class, "Sedan/Saloon");
    }

    #[tokio::test]
    async fn test_correct_clears_last_decoded_vehicle() {
        let h = Harness::new();
        let decoded = h.turn(COROLLA_VIN, &collecting(2)).await;
        assert_eq!(decoded.state.current_vehicle_index, 1);

        let corrected = h.turn(messages::CORRECT, &decoded.state).await;
        assert_eq!(corrected.state.current_step, Step::CollectVehicleInfo);
        assert_eq!(corrected.state.current_vehicle_index, 0);
        assert_eq!(corrected.state.vehicles[0], Default::default());
        assert_eq!(corrected.state.last_decoded_index, None);
        assert_eq!(corrected.messages[0].content, messages::ask_vehicle_vin(0));

        // re-decoding moves on to the vehicle still missing a VIN
        let redone = h.turn(COROLLA_VIN, &corrected.state).await;
        assert_eq!(redone.state.current_vehicle_index, 1);
        assert_eq!(redone.state.current_step, Step::CollectVehicleInfo);
    }

    #[tokio::test]
    async fn test_reenter_during_manual_entry_clears_current_vehicle() {
        let h = Harness::new();
        let first = h.turn(COROLLA_VIN, &collecting(2)).await;
        let failed = h.turn(UNKNOWN_VIN, &first.state).await;
        assert_eq!(failed.state.current_vehicle_index, 1);
        assert_eq!(failed.state.manual_field, Some(ManualField::Year));

        let corrected = h.turn(messages::REENTER_VIN, &failed.state).await;
        assert_eq!(corrected.state.current_vehicle_index, 1);
        assert_eq!(corrected.state.manual_field, None);
        assert_eq!(corrected.state.vehicles[0].attributes.make, "TOYOTA");
        assert_eq!(corrected.state.vehicles[1], Vehicle::default());
        assert_eq!(corrected.messages[0].content, messages::ask_vehicle_vin(1));

        let quoted = h.turn(ODYSSEY_VIN, &corrected.state).await;
        assert_eq!(quoted.state.current_step, Step::ConfirmQuote);
        assert!(quoted.state.vehicles.iter().all(Vehicle::is_captured));
        let quote = &quoted.messages.last().unwrap().content;
        assert!(quote.contains("• Vehículo 1: 2023 TOYOTA Corolla"));
        assert!(quote.contains("• Vehículo 2: 2023 HONDA Odyssey"));
    }

    #[tokio::test]
    async fn test_vehicle_with_vin_but_no_data_is_never_quoted() {
        let h = Harness::new();
        let mut state = collecting(2);
        state.vehicles[1].vin = Some(UNKNOWN_VIN.into());

        // vehicle 2 still needs its details even though it has a VIN
        let result = h.turn(COROLLA_VIN, &state).await;
        assert_eq!(result.state.current_step, Step::CollectVehicleInfo);
        assert_eq!(result.state.current_vehicle_index, 1);
        assert_eq!(result.state.manual_field, Some(ManualField::Year));
        assert_eq!(
            result.messages.last().unwrap().content,
            messages::ask_vehicle_year(1)
        );
    }

    #[tokio::test]
    async fn test_partial_decode_asks_for_missing_fields() {
        let mut partial = corolla();
        partial.model = String::new();
        let decoder = Arc::new(FakeDecoder::with(UNKNOWN_VIN, partial));
        let engine = ConversationEngine::new(
            Arc::new(AgencyConfig::default()),
            decoder,
            Arc::new(LeadDispatcher::new(Arc::new(RecordingSubmitter::default()))),
            Arc::new(CannedFallback(None)),
        );
        let events = EventBus::default();
        let ctx = TurnContext {
            conversation_id: "conv-2",
            history: &[],
            events: &events,
        };

        let result = engine.process_turn(UNKNOWN_VIN, &collecting(1), &ctx).await;
        assert_eq!(result.state.current_step, Step::CollectVehicleInfo);
        assert_eq!(result.state.manual_field, Some(ManualField::Model));
        assert_eq!(
            result.messages.last().unwrap().content,
            messages::ask_vehicle_model(0)
        );

        let result = engine.process_turn("Corolla", &result.state, &ctx).await;
        let result = engine.process_turn("Sedán", &result.state, &ctx).await;
        assert_eq!(result.state.current_step, Step::ConfirmQuote);
        assert_eq!(result.state.vehicles[0].attributes.model, "Corolla");
    }

    #[tokio::test]
    async fn test_correct_from_quote_requotes() {
        let h = Harness::new();
        let quoted = h.turn(COROLLA_VIN, &collecting(1)).await;
        let corrected = h.turn(messages::REENTER_VIN, &quoted.state).await;
        assert_eq!(corrected.state.current_step, Step::CollectVehicleInfo);
        assert_eq!(corrected.state.quote_amount, None);

        let requoted = h.turn(ODYSSEY_VIN, &corrected.state).await;
        assert_eq!(requoted.state.current_step, Step::ConfirmQuote);
        assert_eq!(requoted.state.vehicles[0].attributes.model, "Odyssey");
    }

    #[tokio::test]
    async fn test_vin_help_does_not_advance() {
        let h = Harness::new();
        for input in ["no sé", messages::NO_VIN] {
            let result = h.turn(input, &collecting(1)).await;
            assert_eq!(result.state.current_step, Step::CollectVehicleInfo);
            assert_eq!(result.state.current_vehicle_index, 0);
            assert_eq!(result.messages[0].content, messages::VIN_HELP);
        }
    }

    #[tokio::test]
    async fn test_confirm_quote_branches() {
        let h = Harness::new();
        let quoted = h.turn(COROLLA_VIN, &collecting(1)).await.state;

        let yes = h.turn("sí", &quoted).await;
        assert_eq!(yes.state.current_step, Step::AskName);
        assert_eq!(contents(&yes), vec![messages::ASK_NAME]);

        let no = h.turn("no", &quoted).await;
        assert_eq!(no.state.current_step, Step::Finish);
        assert_eq!(contents(&no), vec![messages::QUOTE_DECLINED]);
        assert_eq!(no.persistence, Persistence::DiscardSnapshots);

        let unsure = h.turn("mmm", &quoted).await;
        assert_eq!(unsure.state.current_step, Step::ConfirmQuote);
        assert_eq!(unsure.messages[0].options(), messages::QUOTE_OPTIONS);
    }

    #[tokio::test]
    async fn test_contact_capture_submits_lead_once() {
        let h = Harness::new();
        let mut state = h.turn(COROLLA_VIN, &collecting(1)).await.state;
        for input in [
            "Sí, continuar",
            "Ana Pérez",
            "ana@example.com",
            "(562) 381-2012",
            "5863 Imperial Hwy, South Gate",
        ] {
            state = h.turn(input, &state).await.state;
        }
        assert_eq!(state.current_step, Step::AskDocument);
        assert_eq!(state.name.as_deref(), Some("Ana Pérez"));

        let done = h.turn("D1234567", &state).await;
        assert_eq!(done.state.current_step, Step::Finish);
        assert!(done.state.lead_submitted);
        assert_eq!(contents(&done), vec![messages::FINISH]);
        assert_eq!(done.lead.unwrap().await.unwrap(), LeadOutcome::Sent);

        let leads = h.submitter.leads.lock().await;
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].idempotency_key, "conv-1");
        assert_eq!(leads[0].contact.phone, "+1 (562) 381-2012");
        drop(leads);

        // reaching the last step again never sends a second lead
        let again = h.turn("D1234567", &state).await;
        assert!(again.lead.is_none());
        assert_eq!(contents(&again), vec![messages::PROCESSING]);
        assert_eq!(h.submitter.count().await, 1);
    }

    #[tokio::test]
    async fn test_small_talk_yes_reserved_for_confirm_quote() {
        let h = Harness::new();
        let result = h.turn("si", &at(Step::AskBirthdate)).await;
        assert_eq!(result.state.current_step, Step::AskBirthdate);
        assert!(messages::SMALL_TALK_YES.contains(&result.messages[0].content.as_str()));
    }

    #[tokio::test]
    async fn test_restart_abandons_progress() {
        let h = Harness::new();
        let mut state = at(Step::AskEmail);
        state.name = Some("Ana".into());

        let result = h.turn("Volver al inicio ⬅️", &state).await;
        assert_eq!(result.state, UserData::new());
        assert_eq!(result.persistence, Persistence::Abandon);
        assert!(result.fresh_conversation);
        assert_eq!(result.messages[0].options(), messages::WELCOME_SUGGESTIONS);

        let result = h.turn(messages::RESUME_NO, &UserData::new()).await;
        assert_eq!(result.persistence, Persistence::DiscardSnapshots);
    }

    #[tokio::test]
    async fn test_handoff_keeps_step_and_publishes() {
        let h = Harness::new();
        let mut events = h.events.subscribe();
        let result = h.turn(messages::TALK_TO_ADVISOR, &at(Step::ConfirmQuote)).await;

        assert_eq!(result.state.current_step, Step::ConfirmQuote);
        assert_eq!(result.messages[0].content, messages::HANDOFF);
        match events.recv().await.unwrap() {
            ChatEvent::Handoff { step, conversation_id, .. } => {
                assert_eq!(step, Step::ConfirmQuote);
                assert_eq!(conversation_id, "conv-1");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_faq_mid_flow_keeps_step() {
        let h = Harness::new();
        let state = collecting(2);
        let result = h.turn("¿tramitan sr-22?", &state).await;
        assert_eq!(result.state, state);
        assert!(result.messages[0].content.starts_with("Claro, "));
    }

    #[tokio::test]
    async fn test_welcome_routing() {
        let h = Harness::new();
        let welcome = at(Step::Welcome);

        let quote = h.turn("quiero cotizar", &welcome).await;
        assert_eq!(quote.state.current_step, Step::AskVehicleCount);
        assert_eq!(quote.state.insurance_type, Some(PolicyKind::Auto));

        let menu = h.turn("ver pólizas", &welcome).await;
        assert_eq!(menu.state.current_step, Step::PolicyMenu);

        let docs = h.turn("requisitos", &welcome).await;
        assert_eq!(docs.state.current_step, Step::Welcome);
        assert_eq!(docs.messages[0].content, messages::DOCUMENTS);

        let other = h.turn("xyz", &welcome).await;
        assert_eq!(other.messages[0].options(), messages::WELCOME_SUGGESTIONS);
    }

    #[tokio::test]
    async fn test_policy_browsing() {
        let h = Harness::new();
        let menu = h.turn(messages::SEE_POLICY_TYPES, &UserData::new()).await;
        assert_eq!(menu.state.current_step, Step::PolicyMenu);
        assert_eq!(menu.messages[0].options().len(), 5);

        let detail = h.turn("cuéntame de hogar", &menu.state).await;
        assert_eq!(detail.state.current_step, Step::PolicyDetail);
        assert_eq!(detail.state.selected_policy, Some(PolicyKind::Hogar));
        assert_eq!(detail.messages[0].content, messages::HOME_POLICY_INFO);

        let quote = h.turn(messages::QUOTE_AUTO, &detail.state).await;
        assert_eq!(quote.state.current_step, Step::AskVehicleCount);
    }

    #[tokio::test]
    async fn test_quick_reply_faq_chip() {
        let h = Harness::new();
        let result = h.turn("Descuentos 💸", &at(Step::Welcome)).await;
        assert!(result.messages[0].content.starts_with("¡Buen punto! "));
    }

    #[tokio::test]
    async fn test_finish_uses_fallback() {
        let h = Harness::new();
        let result = h.turn("¿me explicas algo más?", &at(Step::Finish)).await;
        assert_eq!(contents(&result), vec!["Con gusto te ayudo."]);

        let h = Harness::with_fallback(CannedFallback(None));
        let result = h.turn("¿me explicas algo más?", &at(Step::Finish)).await;
        assert_eq!(contents(&result), vec![messages::FALLBACK_UNSURE]);
    }

    #[tokio::test]
    async fn test_resume_reprompts_step() {
        let h = Harness::new();
        let mut state = at(Step::CollectVehicleInfo);
        state.reset_vehicles(2);
        state.current_vehicle_index = 1;

        let result = h.engine.resume(Some(state.clone()));
        assert_eq!(result.state, state);
        assert_eq!(result.messages[0].content, messages::RESUMED);
        assert_eq!(result.messages[1].content, messages::ask_vehicle_vin(1));

        let result = h.engine.resume(None);
        assert_eq!(result.state, UserData::new());
        assert_eq!(result.messages[0].options(), messages::WELCOME_SUGGESTIONS);

        let result = h.turn(messages::RESUME_YES, &UserData::new()).await;
        assert_eq!(result.persistence, Persistence::Resume);
        assert!(result.messages.is_empty());
    }
}
