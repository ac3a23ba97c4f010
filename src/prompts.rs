//! Extraction prompts sent alongside each flyer.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the price-derivation rules (multi-buy
//!    division, BOGO halving, lower bound of a range) live in exactly one
//!    place per variant.
//!
//! 2. **Testability** — unit tests can inspect the prompts directly without
//!    calling the model, so an accidentally deleted rule is caught early.
//!
//! Callers can override the prompt via [`crate::config::ExtractionConfig::prompt`];
//! the constants here are used only when no override is provided.

use crate::config::FlyerVariant;

/// Prompt for any grocery flyer.
pub const GENERIC_PROMPT: &str = r#"Extract ALL grocery deals from this flyer PDF. For each item provide:
- item: Product name (without size info)
- sale_price: Sale price as number (or null)
- reg_price: Regular price as number (or null)
- unit: Unit like LB, EA (or null)
- size: Package size like "32oz", "3ct", "16oz", "2lb" (or null if not specified)

IMPORTANT RULES:
1. CRITICAL: When you see "X for $Y" deals (like "2 for $6" or "4 for $5"), the deal MUST be physically touching or directly next to the product name
   - If "2 for $6" is on a specific product, calculate 6÷2 = 3.00 and round to cents
   - If you see multiple deals on the same page, DO NOT mix them up
   - Each deal belongs ONLY to the product it's visually attached to
   - Double-check: does THIS specific "X for $Y" apply to THIS specific product?
2. If you see "$X OFF" or "SAVE $X" without actual prices, set both sale_price and reg_price to null
3. For price ranges like "Reg $2.99-3.19", use the LOWER number (2.99)
4. For price ranges like "$13.99-15.99", use the LOWER number (13.99)
5. Extract package size separately (oz, ct, lb, gal, etc.) - this is important for price comparison
6. Skip section headers, page numbers, dates, and non-product text
7. "Reg $X" means reg_price is X
8. Return ONLY a valid JSON array: no markdown fences, no comments, no explanations

VERIFICATION: Before finalizing each "X for $Y" calculation, ask yourself: "Is this deal text directly ON or NEXT TO this specific product?"

Examples:
[
  {"item": "Organic Apples", "sale_price": 2.49, "reg_price": 3.49, "unit": "LB", "size": null},
  {"item": "Apple Juice", "sale_price": 4.99, "reg_price": 6.99, "unit": "EA", "size": "32oz"},
  {"item": "Microwave Popcorn", "sale_price": 3.99, "reg_price": 5.99, "unit": "EA", "size": "3ct"},
  {"item": "Coffee", "sale_price": 9.99, "reg_price": 13.99, "unit": "EA", "size": "10-12oz"},
  {"item": "Greek Yogurt 4 for $5", "sale_price": 1.25, "reg_price": 2.19, "unit": "EA", "size": "5.3oz"},
  {"item": "Snacks 2 for $6", "sale_price": 3.00, "reg_price": 4.99, "unit": "EA", "size": "5.6oz"}
]"#;

/// Prompt for Safeway flyers, which mix BOGO and multi-buy badges densely.
pub const SAFEWAY_PROMPT: &str = r#"Extract ALL grocery deals from this Safeway flyer PDF.

STEP 1: Identify each product and its associated deal
- Look at EACH product individually
- Find the price badge/text DIRECTLY ON or IMMEDIATELY NEXT TO that specific product
- Ignore deals from other products nearby

STEP 2: Extract these fields for each item:
- item: Product name (without size info)
- sale_price: Sale price as number (or null)
- reg_price: Regular price as number (or null)
- unit: Unit like LB, EA (or null)
- size: Package size like "32oz", "3ct", "16oz", "2lb" (or null)
- deal_type: "BOGO", "multi_buy", "regular", or null

STEP 3: Calculate prices based on deal type:

BOGO deals ("BUY X GET X FREE"):
- If prices shown: sale_price = reg_price ÷ 2
- If NO prices shown: sale_price = null, reg_price = null
- deal_type = "BOGO"

Multi-buy deals ("X for $Y"):
- Calculate: sale_price = Y ÷ X, rounded to cents
- "4 for $5" → 5 ÷ 4 = 1.25
- "3 for $12" → 12 ÷ 3 = 4.00
- "2 for $6" → 6 ÷ 2 = 3.00
- deal_type = "multi_buy"

Regular deals:
- Use the member price shown
- deal_type = "regular"

Price ranges like "$2.99-3.49": use the LOWER number (2.99)

STEP 4: Return a valid JSON array only: no markdown fences, no comments, no explanations

[
  {"item": "Soup", "sale_price": 1.25, "reg_price": null, "unit": "EA", "size": "10oz", "deal_type": "multi_buy"},
  {"item": "Chips BOGO", "sale_price": null, "reg_price": null, "unit": "EA", "size": "8oz", "deal_type": "BOGO"}
]"#;

/// Return the built-in prompt for a flyer variant.
pub fn prompt_for(variant: FlyerVariant) -> &'static str {
    match variant {
        FlyerVariant::Generic => GENERIC_PROMPT,
        FlyerVariant::Safeway => SAFEWAY_PROMPT,
    }
}
