use rand::seq::IteratorRandom;
use teloxide::types::{Rgb, User};
use teloxide::utils::html;

use crate::ticket::Requester;

const TOPIC_COLORS: [u32; 6] = [0x6FB9F0, 0xFFD67E, 0xCB86DB, 0x8EEE98, 0xFF93B2, 0xFB6F5F];

pub fn get_random_topic_color() -> Rgb {
    let rnd = TOPIC_COLORS
        .into_iter()
        .choose(&mut rand::thread_rng())
        .unwrap_or(TOPIC_COLORS[0]);

    Rgb::from_u32(rnd)
}

pub fn get_user_name(user: &User) -> String {
    user.username.clone().unwrap_or(user.first_name.clone())
}

pub fn requester(user: &User) -> Requester {
    Requester {
        id: user.id,
        name: get_user_name(user),
    }
}

/// HTML link that pings the requester.
pub fn mention(requester: &Requester) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        requester.id.0,
        html::escape(&requester.name)
    )
}
