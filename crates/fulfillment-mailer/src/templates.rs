//! Transactional email templates.

use fulfillment_types::Order;
use std::fmt::Write;

/// Renders the order confirmation email.
///
/// Returns (subject, html body). The layout is a single-column table that
/// renders acceptably in every mainstream mail client; styles stay inline.
pub fn order_confirmation(order: &Order) -> (String, String) {
	let subject = format!("Order {} confirmed", order.ticket_number);

	let mut items = String::new();
	for item in &order.items {
		let quantity_label = match &item.unit {
			Some(unit) => format!("{} {}", item.quantity, unit),
			None => item.quantity.to_string(),
		};
		let _ = write!(
			items,
			r#"<tr>
  <td style="padding:12px 8px;border-bottom:1px solid #e5e7eb;">
    <div style="font-weight:600;color:#111827;">{name}</div>
    <div style="font-size:13px;color:#6b7280;">Qty: {quantity}</div>
  </td>
  <td style="padding:12px 8px;border-bottom:1px solid #e5e7eb;text-align:right;font-weight:600;">{line_total}</td>
</tr>"#,
			name = item.name,
			quantity = quantity_label,
			line_total = item.unit_price * rust_decimal::Decimal::from(item.quantity),
		);
	}

	let address = &order.shipping_address;
	let html = format!(
		r#"<!DOCTYPE html>
<html>
<body style="margin:0;padding:0;font-family:Arial,sans-serif;background:#f3f4f6;">
  <div style="max-width:600px;margin:0 auto;background:#ffffff;">
    <div style="background:#0066cc;padding:32px 24px;text-align:center;">
      <h1 style="margin:0;color:#ffffff;font-size:24px;">Thank you for your order!</h1>
    </div>
    <div style="padding:24px;">
      <p style="color:#374151;">Hello <strong>{customer}</strong>,</p>
      <p style="color:#4b5563;">Your order has been placed and will be processed shortly.</p>
      <div style="background:#f0f9ff;border-left:4px solid #0066cc;padding:16px;margin:16px 0;">
        <div style="font-size:13px;color:#6b7280;">Order number</div>
        <div style="font-size:20px;font-weight:700;color:#0066cc;">{ticket}</div>
      </div>
      <table style="width:100%;border-collapse:collapse;">{items}</table>
      <table style="width:100%;margin-top:16px;">
        <tr><td style="color:#6b7280;">Subtotal</td><td style="text-align:right;">{subtotal}</td></tr>
        <tr><td style="color:#6b7280;">Shipping</td><td style="text-align:right;">{shipping}</td></tr>
        <tr><td style="font-weight:700;">Total</td><td style="text-align:right;font-weight:700;">{total}</td></tr>
      </table>
      <p style="margin-top:24px;color:#6b7280;font-size:13px;">
        Delivery to: {street}, {ward}, {district}, {province}
      </p>
    </div>
  </div>
</body>
</html>"#,
		customer = order.customer_name(),
		ticket = order.ticket_number,
		items = items,
		subtotal = order.pricing.subtotal,
		shipping = order.pricing.shipping_fee,
		total = order.pricing.total,
		street = address.street,
		ward = address.ward,
		district = address.district,
		province = address.province,
	);

	(subject, html)
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use fulfillment_types::{
		CustomerInfo, LineItem, OrderStatus, OwnerRef, PaymentStatus, Pricing, ShippingAddress,
		StatusHistoryEntry,
	};
	use rust_decimal::Decimal;

	fn order() -> Order {
		let now = Utc::now();
		Order {
			id: "o-1".into(),
			ticket_number: "MD1700000000000".into(),
			order_name: "Order 14/11/2023".into(),
			owner_ref: OwnerRef::Guest,
			items: vec![LineItem {
				product_ref: "p-1".into(),
				name: "Vitamin C 500mg".into(),
				unit_price: Decimal::new(12_000, 0),
				quantity: 2,
				unit: Some("box".into()),
				image: None,
			}],
			customer_info: CustomerInfo {
				name: "A. Customer".into(),
				phone: "0901234567".into(),
				email: None,
			},
			shipping_address: ShippingAddress {
				name: "A. Customer".into(),
				phone: "0901234567".into(),
				email: None,
				street: "1 Main St".into(),
				ward: "Ward 1".into(),
				district: "District 1".into(),
				province: "HCMC".into(),
			},
			payment_method: "cod".into(),
			payment_status: PaymentStatus::Unpaid,
			require_invoice: false,
			invoice_info: None,
			note: String::new(),
			pricing: Pricing {
				subtotal: Decimal::new(24_000, 0),
				discount: Decimal::ZERO,
				voucher_code: None,
				voucher_discount: Decimal::ZERO,
				shipping_fee: Decimal::new(15_000, 0),
				total: Decimal::new(39_000, 0),
			},
			status: OrderStatus::Pending,
			status_history: vec![StatusHistoryEntry {
				status: OrderStatus::Pending,
				note: "order created".into(),
				timestamp: now,
			}],
			created_at: now,
			updated_at: now,
			confirmed_at: None,
			delivered_at: None,
			cancelled_at: None,
			return_requested_at: None,
			returned_at: None,
			return_rejected_at: None,
			return_reason: None,
			return_rejection_reason: None,
		}
	}

	#[test]
	fn confirmation_carries_ticket_and_totals() {
		let (subject, html) = order_confirmation(&order());
		assert!(subject.contains("MD1700000000000"));
		assert!(html.contains("MD1700000000000"));
		assert!(html.contains("Vitamin C 500mg"));
		assert!(html.contains("39000"));
	}
}
