//! Instruction prompts sent to the model.

/// Sentinel the model is told to use for fields it cannot read.
pub const NOT_AVAILABLE: &str = "N/A";

/// Instruction accompanying a photographed business card.
pub const CARD_IMAGE_PROMPT: &str = "\
This is a business card and you are a business-card secretary. \
Organize the following information into JSON for me. \
Fill in N/A for anything you cannot make out. Reply with the JSON only, \
using the keys: name, title, address, email, phone, company. \
Format phone as #886-0123-456-789,1234 and leave out the ,1234 part when there is no extension.";

/// Search request over a user's saved cards.
#[must_use]
pub fn card_search_prompt(cards_json: &str, query: &str) -> String {
    format!(
        "Here are all of my saved business cards ({cards_json}). \
         Find the cards that match the query below, for example by name, title or company name. \
         The query is: {query}. Reply with the matching JSON data only."
    )
}
