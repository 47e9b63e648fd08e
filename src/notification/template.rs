//! Order confirmation mail body.

use chrono::Duration;

use crate::domain::aggregates::Order;

pub fn subject(prefix: &str, order: &Order) -> String {
    format!("{prefix} #{}", order.id().simple())
}

pub fn render_order_confirmation(order: &Order) -> String {
    let rows: String = order
        .details()
        .iter()
        .enumerate()
        .map(|(i, d)| {
            format!(
                r#"
        <tr>
          <td style="text-align:center;">{}</td>
          <td>{}</td>
          <td style="text-align:right;">{}</td>
          <td style="text-align:center;">{}</td>
          <td style="text-align:right;">{}</td>
        </tr>"#,
                i + 1,
                escape(&d.product_title),
                d.price_at_order,
                d.quantity,
                d.line_total(),
            )
        })
        .collect();

    let contact = order.contact();
    let placed_at = (order.created_at().naive_utc() + Duration::hours(7)).format("%d/%m/%Y %H:%M");

    format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; color: #333;">
    <h2>Cảm ơn bạn đã đặt hàng tại <strong>Nhà Thuốc Pharmacy</strong>!</h2>
    <p><strong>Khách hàng:</strong> {name}</p>
    <p><strong>SĐT:</strong> {phone}</p>
    <p><strong>Địa chỉ:</strong> {address}</p>
    <p><strong>Mã đơn hàng:</strong> #{id}</p>
    <p><strong>Ngày đặt:</strong> {placed_at}</p>
    <h3>Danh sách sản phẩm</h3>
    <table border="1" cellpadding="8" cellspacing="0" width="100%" style="border-collapse: collapse;">
      <thead style="background-color: #f5f5f5;">
        <tr><th>STT</th><th>Sản phẩm</th><th>Đơn giá</th><th>Số lượng</th><th>Thành tiền</th></tr>
      </thead>
      <tbody>{rows}
      </tbody>
    </table>
    <h3 style="text-align: right;">Tổng thanh toán: <span style="color: green;">{total}</span></h3>
    <p>Chúng tôi sẽ liên hệ để giao hàng sớm nhất. Trân trọng!</p>
  </body>
</html>
"#,
        name = escape(&contact.full_name),
        phone = escape(&contact.phone),
        address = escape(&contact.address),
        id = order.id().simple(),
        total = order.total(),
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
