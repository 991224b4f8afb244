// handlers.rs
use log::{debug, error, info};
use std::sync::Arc;
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{ChatId, UserId};

use crate::commands::{invitation, Command};
use crate::error::{TicketError, TicketResult};
use crate::interaction::{Interaction, OutgoingMessage};
use crate::order::{FormStep, OrderForm};
use crate::platform::{PlatformError, TicketPlatform};
use crate::service::{Reply, TicketService};
use crate::telegram::TelegramPlatform;
use crate::ticket::TicketKey;
use crate::util::{get_user_name, requester};

pub type Desk = TicketService<TelegramPlatform>;
pub type HandlerResult = Result<(), teloxide::RequestError>;

/// Per-chat progress through an order form.
#[derive(Clone, Debug, Default)]
pub enum OrderDialogue {
    #[default]
    Idle,
    Filling {
        form: OrderForm,
    },
}

pub type OrderDialogueStorage = InMemStorage<OrderDialogue>;
pub type OrderDialogueHandle = Dialogue<OrderDialogue, OrderDialogueStorage>;

const SKIP: &str = "/skip";

pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    let messages = Update::filter_message()
        .enter_dialogue::<Message, OrderDialogueStorage, OrderDialogue>()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_commands),
        )
        .branch(dptree::case![OrderDialogue::Filling { form }].endpoint(receive_order_answer))
        .branch(dptree::endpoint(handle_messages));

    dptree::entry()
        .branch(messages)
        .branch(Update::filter_callback_query().endpoint(handle_callback))
}

/// Who an outcome is reported back to.
enum Actor<'a> {
    /// A button press; notices become a popup only the presser sees.
    Button(&'a CallbackQuery),
    /// A private chat with the bot.
    Chat(ChatId),
}

impl Actor<'_> {
    fn private_chat(&self) -> ChatId {
        match self {
            Actor::Button(q) => ChatId::from(q.from.id),
            Actor::Chat(chat) => *chat,
        }
    }
}

/// Where an outcome ends up for the acting user.
#[derive(Debug, Default, PartialEq, Eq)]
struct Resolution {
    notice: Option<String>,
    prompt: Option<OutgoingMessage>,
}

/// Expected rejections become a notice for the actor only, anything else is
/// logged and the interaction ends without a result.
fn resolve(outcome: TicketResult<Reply>) -> Resolution {
    match outcome {
        Ok(Reply::Notice(text)) => Resolution {
            notice: Some(text),
            prompt: None,
        },
        Ok(Reply::Prompt(prompt)) => Resolution {
            notice: None,
            prompt: Some(prompt),
        },
        Ok(Reply::Done) => Resolution::default(),
        Err(err) => match err.notice() {
            Some(notice) => {
                info!("Rejected interaction: {err}");
                Resolution {
                    notice: Some(notice),
                    prompt: None,
                }
            }
            None => {
                error!("Interaction failed: {err}");
                Resolution::default()
            }
        },
    }
}

/// Single sink for interaction outcomes.
async fn settle(bot: &Bot, desk: &Desk, actor: Actor<'_>, outcome: TicketResult<Reply>) -> HandlerResult {
    let Resolution { notice, prompt } = resolve(outcome);
    if let Some(prompt) = prompt {
        if let Err(err) = desk.platform().send(actor.private_chat(), None, &prompt).await {
            error!("Could not deliver prompt to {}: {err}", actor.private_chat());
        }
    }

    match actor {
        Actor::Button(q) => {
            let mut answer = bot.answer_callback_query(q.id.clone());
            if let Some(text) = notice {
                answer = answer.text(text).show_alert(true);
            }
            answer.await?;
        }
        Actor::Chat(chat) => {
            if let Some(text) = notice {
                bot.send_message(chat, text).await?;
            }
        }
    }
    Ok(())
}

/// Handles bot commands
pub async fn handle_commands(msg: Message, cmd: Command, desk: Arc<Desk>) -> HandlerResult {
    match cmd {
        Command::SendTicket => {
            let thread = msg.thread_id.filter(|_| msg.is_topic_message);
            desk.platform()
                .send(msg.chat.id, thread, &invitation())
                .await?;
            debug!("Posted ticket invitation in {}", msg.chat.id);
        }
    }
    Ok(())
}

/// Handles button presses
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    desk: Arc<Desk>,
    storage: Arc<OrderDialogueStorage>,
) -> HandlerResult {
    let actor = q.from.id;
    let outcome = match q.data.as_deref().map(Interaction::decode) {
        None => Err(TicketError::UnknownInteraction(String::new())),
        Some(Err(err)) => Err(err),
        Some(Ok(Interaction::CreateTicket)) => desk.provision(&requester(&q.from)).await,
        Some(Ok(Interaction::OpenOrderForm(key))) => {
            start_order_form(&desk, storage, actor, key).await
        }
        Some(Ok(Interaction::RequestClose(key))) => desk.request_close(actor, key).await,
        Some(Ok(Interaction::ConfirmClose(key))) => desk.confirm_close(actor, key).await,
        Some(Ok(Interaction::CancelClose(key))) => desk.cancel_close(actor, key).await,
    };
    settle(&bot, &desk, Actor::Button(&q), outcome).await
}

/// Opens a fresh form in the presser's private chat.
async fn start_order_form(
    desk: &Desk,
    storage: Arc<OrderDialogueStorage>,
    actor: UserId,
    key: TicketKey,
) -> TicketResult<Reply> {
    let form = desk.open_order_form(key).await?;
    let first = OutgoingMessage::text(form.step().prompt().unwrap_or_default());

    let dialogue = OrderDialogueHandle::new(storage, ChatId::from(actor));
    dialogue.update(OrderDialogue::Filling { form }).await?;
    desk.platform()
        .send(ChatId::from(actor), None, &first)
        .await
        .map_err(PlatformError::from)?;

    Ok(Reply::Notice(
        "📝 Power Leveling Order: answer the questions in our private chat.".to_string(),
    ))
}

/// What one answer did to an order form.
#[derive(Debug)]
pub enum FormOutcome {
    /// The form stays open in this chat.
    Continue(TicketResult<Reply>),
    /// The form instance is used up, whatever the result.
    Finished(TicketResult<Reply>),
}

/// Applies one private-chat message to `form`. `None` stands for a message
/// without text. The last answer submits the form on behalf of `submitter`.
pub async fn apply_answer<P: TicketPlatform>(
    desk: &TicketService<P>,
    form: &mut OrderForm,
    answer: Option<&str>,
    submitter: UserId,
) -> FormOutcome {
    let Some(text) = answer else {
        return FormOutcome::Continue(Ok(Reply::Notice("Please answer with text.".to_string())));
    };
    let answering = form.step();
    let text = if answering == FormStep::Bonus && text.trim() == SKIP {
        ""
    } else {
        text
    };

    match form.answer(text) {
        Err(err @ TicketError::AlreadySubmitted(_)) => FormOutcome::Finished(Err(err)),
        Err(err) => FormOutcome::Continue(Err(err)),
        Ok(_) if answering == FormStep::Bonus => {
            FormOutcome::Finished(desk.submit_order(form, submitter).await)
        }
        Ok(next) => FormOutcome::Continue(Ok(match next.prompt() {
            Some(prompt) => Reply::Prompt(OutgoingMessage::text(prompt)),
            None => Reply::Done,
        })),
    }
}

/// Collects one answer of an open order form.
pub async fn receive_order_answer(
    bot: Bot,
    dialogue: OrderDialogueHandle,
    mut form: OrderForm,
    msg: Message,
    desk: Arc<Desk>,
) -> HandlerResult {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };

    let outcome = match apply_answer(&desk, &mut form, msg.text(), from.id).await {
        FormOutcome::Continue(outcome) => {
            match dialogue.update(OrderDialogue::Filling { form }).await {
                Ok(()) => outcome,
                Err(err) => Err(err.into()),
            }
        }
        FormOutcome::Finished(outcome) => {
            if let Err(err) = dialogue.exit().await {
                error!("Could not end order dialogue in {}: {err}", msg.chat.id);
            }
            outcome
        }
    };

    settle(&bot, &desk, Actor::Chat(msg.chat.id), outcome).await
}

/// Handles regular messages: relays conversation between a requester's
/// private chat and their ticket topic.
pub async fn handle_messages(msg: Message, desk: Arc<Desk>) -> HandlerResult {
    let (Some(text), Some(from)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    if from.is_bot {
        return Ok(());
    }

    let relayed = if msg.chat.is_private() {
        match desk.ticket_for(from.id).await {
            Some(ticket) => {
                desk.platform()
                    .relay_to_support(&ticket, &get_user_name(from), text)
                    .await
            }
            None => return Ok(()),
        }
    } else if msg.chat.id == desk.platform().support().0 {
        let Some(thread) = msg.thread_id else {
            return Ok(());
        };
        match desk.ticket_at(msg.chat.id, thread).await {
            Some(ticket) => desk.platform().relay_to_requester(&ticket, text).await,
            None => return Ok(()),
        }
    } else {
        return Ok(());
    };

    if let Err(err) = relayed {
        error!("Relay from {} failed: {err}", msg.chat.id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::{FakePlatform, FAKE_GROUP};
    use crate::ticket::{Requester, SupportRole};

    async fn open_form(owner: u64) -> (TicketService<FakePlatform>, OrderForm) {
        let desk = TicketService::new(FakePlatform::default(), SupportRole(FAKE_GROUP));
        let requester = Requester {
            id: UserId(owner),
            name: format!("user{owner}"),
        };
        desk.provision(&requester).await.unwrap();
        let key = desk.ticket_for(UserId(owner)).await.unwrap().key();
        let form = desk.open_order_form(key).await.unwrap();
        (desk, form)
    }

    #[tokio::test]
    async fn answers_advance_with_the_next_question() {
        let (desk, mut form) = open_form(42).await;

        let outcome = apply_answer(&desk, &mut form, Some("1-200"), UserId(42)).await;
        let FormOutcome::Continue(Ok(Reply::Prompt(prompt))) = outcome else {
            panic!("expected the next question");
        };
        assert_eq!(Some(prompt.text.as_str()), FormStep::Characters.prompt());
        assert_eq!(form.step(), FormStep::Characters);
    }

    #[tokio::test]
    async fn skip_submits_without_bonus() {
        let (desk, mut form) = open_form(42).await;
        apply_answer(&desk, &mut form, Some("1-200"), UserId(42)).await;
        apply_answer(&desk, &mut form, Some("1"), UserId(42)).await;

        let outcome = apply_answer(&desk, &mut form, Some(" /skip "), UserId(42)).await;
        assert!(matches!(outcome, FormOutcome::Finished(Ok(Reply::Done))));

        let posts = desk.platform().channel("ticket-42").unwrap().posts;
        assert!(posts.last().unwrap().text.ends_with("<b>Bonus</b>\nNone"));
    }

    #[tokio::test]
    async fn non_text_message_is_asked_again() {
        let (desk, mut form) = open_form(42).await;

        let outcome = apply_answer(&desk, &mut form, None, UserId(42)).await;
        assert!(matches!(
            outcome,
            FormOutcome::Continue(Ok(Reply::Notice(ref text))) if text == "Please answer with text."
        ));
        assert_eq!(form.step(), FormStep::LevelRange);
    }

    #[tokio::test]
    async fn blank_required_answer_keeps_the_form_open() {
        let (desk, mut form) = open_form(42).await;

        let outcome = apply_answer(&desk, &mut form, Some("   "), UserId(42)).await;
        assert!(matches!(
            outcome,
            FormOutcome::Continue(Err(TicketError::MissingField("Level Range")))
        ));
    }

    #[tokio::test]
    async fn form_ends_after_a_refused_submission() {
        let (desk, mut form) = open_form(42).await;
        apply_answer(&desk, &mut form, Some("1-200"), UserId(99)).await;
        apply_answer(&desk, &mut form, Some("1"), UserId(99)).await;

        let outcome = apply_answer(&desk, &mut form, Some("Wisdom Set"), UserId(99)).await;
        assert!(matches!(
            outcome,
            FormOutcome::Finished(Err(TicketError::NotOwner { .. }))
        ));
        assert_eq!(desk.platform().channel("ticket-42").unwrap().posts.len(), 2);
    }

    #[tokio::test]
    async fn submitted_form_takes_no_more_answers() {
        let (desk, mut form) = open_form(42).await;
        for answer in ["1-200", "1", "/skip"] {
            apply_answer(&desk, &mut form, Some(answer), UserId(42)).await;
        }

        let outcome = apply_answer(&desk, &mut form, Some("again"), UserId(42)).await;
        assert!(matches!(
            outcome,
            FormOutcome::Finished(Err(TicketError::AlreadySubmitted(UserId(42))))
        ));
    }

    #[test]
    fn outcomes_resolve_to_notice_or_prompt() {
        assert_eq!(
            resolve(Ok(Reply::Notice("🔒 ticket-42 closed.".into()))).notice.as_deref(),
            Some("🔒 ticket-42 closed.")
        );

        let prompt = OutgoingMessage::text("Are you sure you want to close this ticket?");
        let resolution = resolve(Ok(Reply::Prompt(prompt.clone())));
        assert_eq!(resolution.prompt, Some(prompt));
        assert_eq!(resolution.notice, None);

        assert_eq!(resolve(Ok(Reply::Done)), Resolution::default());
        assert_eq!(
            resolve(Err(TicketError::AlreadyOpen(UserId(42)))).notice.as_deref(),
            Some("❗ You already have a ticket open.")
        );
        let failure = TicketError::from(PlatformError::Rejected("topic limit".into()));
        assert_eq!(resolve(Err(failure)), Resolution::default());
    }
}
