use crate::rates::{Conversion, Currency};
use crate::reconcile::Freshness;

/// RFC 1123, always in UTC
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Render a conversion as a small multi-line card
pub fn render(conversion: &Conversion, freshness: Freshness) -> String {
  let tag = match freshness {
    Freshness::Saved => " (saved)",
    Freshness::Fresh => "",
  };

  format!(
    "[{id}]{tag}\n  {amount:.3} {fr} = {converted:.6} {to}\n  1 {fr} = {dc} {to}\n  1 {to} = {rc} {fr}\n  {date}",
    id = conversion.id,
    tag = tag,
    amount = conversion.amount,
    converted = conversion.converted_amount(),
    fr = conversion.fr,
    to = conversion.to,
    dc = conversion.dc,
    rc = conversion.rc,
    date = conversion.date.format(DATE_FORMAT),
  )
}

/// One `CODE  Name` line per currency
pub fn render_currencies(currencies: &[Currency]) -> String {
  currencies
    .iter()
    .map(|c| format!("{:<5} {}", c.id, c.name))
    .collect::<Vec<_>>()
    .join("\n")
}
