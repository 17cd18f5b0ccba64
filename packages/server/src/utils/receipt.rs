use chrono::{DateTime, Utc};
use common::PaymentMethod;
use rust_decimal::Decimal;

/// Everything printed on a payment receipt.
pub struct ReceiptView<'a> {
    pub display_id: &'a str,
    pub student_name: &'a str,
    pub program_name: &'a str,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference_number: Option<&'a str>,
    pub paid_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
    pub validated_by: Option<&'a str>,
    pub balance: Decimal,
}

/// Escape text for inclusion in HTML element content or quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn money(amount: Decimal) -> String {
    format!("PHP {:.2}", amount.round_dp(2))
}

pub fn render_receipt(view: &ReceiptView<'_>) -> String {
    let row = |label: &str, value: &str| {
        format!(
            "<tr><th>{}</th><td>{}</td></tr>\n",
            escape_html(label),
            escape_html(value)
        )
    };

    let mut rows = String::new();
    rows.push_str(&row("Receipt No.", view.display_id));
    rows.push_str(&row("Student", view.student_name));
    rows.push_str(&row("Program", view.program_name));
    rows.push_str(&row("Amount", &money(view.amount)));
    rows.push_str(&row("Method", view.method.label()));
    if let Some(reference) = view.reference_number {
        rows.push_str(&row("Reference", reference));
    }
    rows.push_str(&row(
        "Payment date",
        &view.paid_at.format("%Y-%m-%d %H:%M UTC").to_string(),
    ));
    if let Some(at) = view.validated_at {
        rows.push_str(&row(
            "Validated",
            &at.format("%Y-%m-%d %H:%M UTC").to_string(),
        ));
    }
    if let Some(by) = view.validated_by {
        rows.push_str(&row("Validated by", by));
    }
    rows.push_str(&row("Remaining balance", &money(view.balance)));

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Receipt {id}</title>\n\
         <style>body{{font-family:sans-serif;max-width:40em;margin:2em auto}}\
         th{{text-align:left;padding-right:2em}}</style>\n\
         </head>\n<body>\n<h1>TPLearn Official Receipt</h1>\n<table>\n{rows}</table>\n\
         </body>\n</html>\n",
        id = escape_html(view.display_id),
    )
}
