//! Invoice rendering.
//!
//! Produces a paginated HTML document for an order. Read-only consumer of
//! order data; layout polish is out of scope.

use askama::Template;

use crate::models::{Order, User};

/// Item rows per invoice page.
const ITEMS_PER_PAGE: usize = 12;

/// One pre-formatted line of the invoice.
#[derive(Clone)]
struct InvoiceRow {
    name: String,
    variant: String,
    quantity: u32,
    unit_price: String,
    line_total: String,
}

/// One page of invoice rows.
struct InvoicePage {
    number: usize,
    rows: Vec<InvoiceRow>,
}

/// Invoice document template.
#[derive(Template)]
#[template(path = "invoice.html")]
struct InvoiceTemplate {
    order_number: String,
    placed_on: String,
    customer_name: String,
    customer_email: String,
    address_lines: Vec<String>,
    payment_method: String,
    pages: Vec<InvoicePage>,
    page_count: usize,
    subtotal: String,
    discount: String,
    shipping_charge: String,
    total: String,
    paid: bool,
}

/// Render the invoice for an order and its owning user.
///
/// # Errors
///
/// Returns `askama::Error` if template rendering fails.
pub fn render_invoice(order: &Order, customer: &User) -> Result<String, askama::Error> {
    let rows: Vec<InvoiceRow> = order
        .items
        .iter()
        .map(|item| InvoiceRow {
            name: item.name.clone(),
            variant: item.variant.to_string(),
            quantity: item.quantity,
            unit_price: format!("${:.2}", item.unit_price),
            line_total: format!(
                "${:.2}",
                item.unit_price * rust_decimal::Decimal::from(item.quantity)
            ),
        })
        .collect();

    let mut pages: Vec<InvoicePage> = rows
        .chunks(ITEMS_PER_PAGE)
        .enumerate()
        .map(|(index, chunk)| InvoicePage {
            number: index + 1,
            rows: chunk.to_vec(),
        })
        .collect();
    if pages.is_empty() {
        pages.push(InvoicePage {
            number: 1,
            rows: Vec::new(),
        });
    }

    let address = &order.shipping_address;
    let mut address_lines = vec![address.full_name.clone(), address.line1.clone()];
    if let Some(line2) = &address.line2 {
        address_lines.push(line2.clone());
    }
    address_lines.push(format!(
        "{}, {} {}",
        address.city, address.state, address.postal_code
    ));
    address_lines.push(address.country.clone());

    let page_count = pages.len();
    InvoiceTemplate {
        order_number: order.order_number.clone(),
        placed_on: order.created_at.format("%Y-%m-%d").to_string(),
        customer_name: customer.name.clone(),
        customer_email: customer.email.to_string(),
        address_lines,
        payment_method: order.payment_method.to_string(),
        pages,
        page_count,
        subtotal: format!("${:.2}", order.subtotal),
        discount: format!("${:.2}", order.discount),
        shipping_charge: format!("${:.2}", order.shipping_charge),
        total: format!("${:.2}", order.total),
        paid: order.is_paid,
    }
    .render()
}
