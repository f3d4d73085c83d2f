//! Reply composition: cards in, text plus Flex carousel out.

use crate::card::NameCard;
use crate::config::BotConfig;
use crate::line::MessagingApi;
use crate::line::message::{
    BoxLayout, BubbleSize, FlexBox, FlexBubble, FlexCarousel, FlexImage, FlexText, Message,
};

/// Shown by clients that cannot render Flex messages.
pub const FLEX_ALT_TEXT: &str = "Please open the card details on your phone.";

/// Label of the link at the bottom of every card.
pub const MORE_INFO_LABEL: &str = "More info";

const MAP_SEARCH_BASE: &str = "https://www.google.com/maps/search/?api=1&query=";

/// Fixed assets shared by every card.
#[derive(Debug, Clone)]
pub struct CardStyle {
    pub logo_url: String,
    pub more_info_url: String,
}

impl From<&BotConfig> for CardStyle {
    fn from(bot: &BotConfig) -> Self {
        Self {
            logo_url: bot.logo_url.clone(),
            more_info_url: bot.more_info_url.clone(),
        }
    }
}

/// A composed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub carousel: FlexCarousel,
}

impl Reply {
    /// Messages for the reply API. An empty carousel is left out because the
    /// platform rejects Flex carousels without bubbles.
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        let mut messages = vec![Message::text(self.text)];
        if !self.carousel.contents.is_empty() {
            messages.push(Message::flex(FLEX_ALT_TEXT, self.carousel));
        }
        messages
    }
}

/// Build a reply with one card per record, in order.
#[must_use]
pub fn compose(text: impl Into<String>, cards: &[NameCard], style: &CardStyle) -> Reply {
    Reply {
        text: text.into(),
        carousel: FlexCarousel {
            contents: cards.iter().map(|card| render_card(card, style)).collect(),
        },
    }
}

/// Map search URL for free text, query-escaped the way HTML forms are.
#[must_use]
pub fn map_search_url(query: &str) -> String {
    let escaped: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("{MAP_SEARCH_BASE}{escaped}&openExternalBrowser=1")
}

/// Logo on the left (flex 1), the card's fields stacked on the right (flex 4).
#[must_use]
pub fn render_card(card: &NameCard, style: &CardStyle) -> FlexBubble {
    let logo = FlexImage {
        url: style.logo_url.clone(),
        flex: Some(1),
        size: Some("full".to_string()),
        aspect_ratio: Some("1:1".to_string()),
        aspect_mode: Some("cover".to_string()),
    };

    let details = FlexBox::new(
        BoxLayout::Vertical,
        vec![
            FlexText::new(&card.name).align("end").size("xxl").bold().into(),
            FlexText::new(&card.title).align("end").size("sm").into(),
            FlexText::new(&card.company)
                .align("end")
                .margin("xxl")
                .size("lg")
                .bold()
                .uri(map_search_url(&card.company))
                .into(),
            FlexText::new(&card.address)
                .align("end")
                .size("sm")
                .uri(map_search_url(&card.address))
                .into(),
            FlexText::new(&card.phone)
                .align("end")
                .margin("xxl")
                .uri(format!("tel:{}", card.phone))
                .into(),
            FlexText::new(&card.email)
                .align("end")
                .uri(format!("mailto:{}", card.email))
                .into(),
            FlexText::new(MORE_INFO_LABEL)
                .align("end")
                .uri(style.more_info_url.clone())
                .into(),
        ],
    )
    .flex(4);

    FlexBubble {
        size: Some(BubbleSize::Giga),
        body: FlexBox::new(BoxLayout::Horizontal, vec![logo.into(), details.into()]).spacing("md"),
    }
}

/// Send `reply` with the event's reply token. Failures are logged only.
pub async fn send(messaging: &dyn MessagingApi, reply_token: &str, reply: Reply) {
    let cards = reply.carousel.contents.len();
    if let Err(e) = messaging
        .reply_message(reply_token, reply.into_messages())
        .await
    {
        tracing::error!(error = %e, cards, "Failed to send reply");
    } else {
        tracing::debug!(cards, "Reply sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::message::{Action, FlexComponent};

    fn style() -> CardStyle {
        CardStyle {
            logo_url: "https://example.com/logo.jpeg".into(),
            more_info_url: "https://example.com/about".into(),
        }
    }

    fn card() -> NameCard {
        NameCard {
            name: "Ann Lee".into(),
            title: "CTO".into(),
            address: "1 Main St, Taipei".into(),
            email: "ann@acme.test".into(),
            phone: "#886-0123-456-789".into(),
            company: "Acme Co".into(),
        }
    }

    fn texts(bubble: &FlexBubble) -> Vec<&FlexText> {
        let FlexComponent::Box(details) = &bubble.body.contents[1] else {
            panic!("second column should be a box");
        };
        details
            .contents
            .iter()
            .map(|c| match c {
                FlexComponent::Text(t) => t,
                other => panic!("unexpected component {other:?}"),
            })
            .collect()
    }

    fn uri(text: &FlexText) -> &str {
        match &text.action {
            Some(Action::Uri { uri }) => uri,
            None => panic!("{} has no action", text.text),
        }
    }

    #[test]
    fn test_company_link_is_query_escaped() {
        let bubble = render_card(&card(), &style());
        let t = texts(&bubble);
        assert_eq!(t[2].text, "Acme Co");
        assert!(uri(t[2]).contains("query=Acme+Co&"));
        assert!(uri(t[3]).contains("query=1+Main+St%2C+Taipei&"));
    }

    #[test]
    fn test_layout_and_order() {
        let bubble = render_card(&card(), &style());
        assert_eq!(bubble.size, Some(BubbleSize::Giga));
        assert_eq!(bubble.body.layout, BoxLayout::Horizontal);
        assert_eq!(bubble.body.spacing.as_deref(), Some("md"));

        let FlexComponent::Image(logo) = &bubble.body.contents[0] else {
            panic!("first column should be the logo");
        };
        assert_eq!(logo.flex, Some(1));
        assert_eq!(logo.url, "https://example.com/logo.jpeg");

        let FlexComponent::Box(details) = &bubble.body.contents[1] else {
            panic!("second column should be a box");
        };
        assert_eq!(details.flex, Some(4));
        assert_eq!(details.layout, BoxLayout::Vertical);

        let t = texts(&bubble);
        let labels: Vec<_> = t.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Ann Lee",
                "CTO",
                "Acme Co",
                "1 Main St, Taipei",
                "#886-0123-456-789",
                "ann@acme.test",
                MORE_INFO_LABEL
            ]
        );
        assert_eq!(t[0].weight.as_deref(), Some("bold"));
        assert_eq!(t[0].size.as_deref(), Some("xxl"));
        assert!(t[0].action.is_none());
        assert!(t[1].action.is_none());
    }

    #[test]
    fn test_phone_and_email_links_are_raw() {
        let bubble = render_card(&card(), &style());
        let t = texts(&bubble);
        assert_eq!(uri(t[4]), "tel:#886-0123-456-789");
        assert_eq!(uri(t[5]), "mailto:ann@acme.test");
        assert_eq!(uri(t[6]), "https://example.com/about");
    }

    #[test]
    fn test_zero_cards() {
        let reply = compose("nothing found", &[], &style());
        assert!(reply.carousel.contents.is_empty());

        let messages = reply.into_messages();
        assert_eq!(messages, vec![Message::text("nothing found")]);
    }

    #[test]
    fn test_cards_keep_order() {
        let mut second = card();
        second.name = "Bob".into();
        let reply = compose("two", &[card(), second], &style());
        assert_eq!(reply.carousel.contents.len(), 2);
        assert_eq!(texts(&reply.carousel.contents[1])[0].text, "Bob");

        let messages = reply.into_messages();
        assert_eq!(messages.len(), 2);
        assert!(matches!(&messages[1], Message::Flex { alt_text, .. } if alt_text == FLEX_ALT_TEXT));
    }
}
