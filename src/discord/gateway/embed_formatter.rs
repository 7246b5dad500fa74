// Renders core `Reply` cards as serenity embeds.

use crate::core::gateway::{Reply, Tone};
use poise::serenity_prelude::{
    Color, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, Timestamp,
};

pub fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Neutral => Color::from_rgb(153, 170, 181),
        Tone::Info => Color::BLURPLE,
        Tone::Success => Color::from_rgb(0, 200, 83),
        Tone::Warning => Color::ORANGE,
        Tone::Error => Color::RED,
    }
}

pub fn reply_embed(reply: &Reply) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .color(tone_color(reply.tone))
        .timestamp(Timestamp::now());

    if let Some(title) = &reply.title {
        embed = embed.title(title);
    }
    if let Some(description) = &reply.description {
        embed = embed.description(description);
    }
    for field in &reply.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &reply.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }
    if let Some(author) = &reply.author {
        let mut header = CreateEmbedAuthor::new(&author.name);
        if let Some(icon) = &author.icon_url {
            header = header.icon_url(icon);
        }
        embed = embed.author(header);
    }
    embed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn reply_fields_carry_over() {
        let reply = Reply::new("Warn Member")
            .description("<@30> has been warned.")
            .field("Warn Count", "`1`", true)
            .footer("moderator")
            .tone(Tone::Success);

        let json = serde_json::to_value(reply_embed(&reply)).unwrap();
        assert_eq!(json["title"], "Warn Member");
        assert_eq!(json["description"], "<@30> has been warned.");
        assert_eq!(json["fields"][0]["name"], "Warn Count");
        assert_eq!(json["fields"][0]["inline"], Value::Bool(true));
        assert_eq!(json["footer"]["text"], "moderator");
        assert_eq!(json["color"], tone_color(Tone::Success).0);
    }

    #[test]
    fn empty_parts_are_left_out() {
        let json = serde_json::to_value(reply_embed(&Reply::default())).unwrap();
        assert!(json.get("title").is_none());
        assert!(json.get("author").is_none());
    }
}
