//! Payment gateway adapter
pub mod vnpay;

use serde::Serialize;
use uuid::Uuid;

use crate::{CommerceError, ErrorKind, OrderError};

pub use vnpay::{VnPayConfig, VnPayGateway};

/// Gateway response code for an approved payment.
pub const APPROVED: &str = "00";

/// A callback whose signature has been checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayCallback {
    /// Order id in simple hex form, as sent in `vnp_TxnRef`.
    pub order_ref: String,
    pub response_code: String,
    pub amount_minor: i64,
    pub transaction_no: Option<String>,
}

impl GatewayCallback {
    pub fn approved(&self) -> bool { self.response_code == APPROVED }

    pub fn order_id(&self) -> crate::Result<Uuid> {
        Uuid::parse_str(&self.order_ref).map_err(|_| CommerceError::OrderNotFound(self.order_ref.clone()))
    }
}

/// Body VNPay expects back from the IPN endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpnReply {
    pub rsp_code: &'static str,
    pub message: &'static str,
}

impl IpnReply {
    pub fn confirmed() -> Self { Self { rsp_code: "00", message: "Confirm Success" } }
    pub fn already_confirmed() -> Self { Self { rsp_code: "02", message: "Order already confirmed" } }

    pub fn from_error(error: &CommerceError) -> Self {
        match error {
            CommerceError::OrderNotFound(_) => Self { rsp_code: "01", message: "Order not found" },
            CommerceError::Order(OrderError::AmountMismatch { .. }) => Self { rsp_code: "04", message: "Invalid amount" },
            CommerceError::InvalidSignature => Self { rsp_code: "97", message: "Invalid signature" },
            e if e.kind() == ErrorKind::Validation => Self { rsp_code: "99", message: "Invalid request" },
            _ => Self { rsp_code: "99", message: "Unknown error" },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipn_codes() {
        assert_eq!(IpnReply::from_error(&CommerceError::InvalidSignature).rsp_code, "97");
        assert_eq!(IpnReply::from_error(&CommerceError::OrderNotFound("x".into())).rsp_code, "01");
        let mismatch = CommerceError::Order(OrderError::AmountMismatch { expected: 1, received: 2 });
        assert_eq!(IpnReply::from_error(&mismatch).rsp_code, "04");
        assert_eq!(
            serde_json::to_value(IpnReply::confirmed()).unwrap(),
            serde_json::json!({"RspCode": "00", "Message": "Confirm Success"})
        );
    }

    #[test]
    fn test_unparseable_reference_is_unknown_order() {
        let cb = GatewayCallback { order_ref: "42".into(), response_code: "00".into(), amount_minor: 0, transaction_no: None };
        assert!(matches!(cb.order_id(), Err(CommerceError::OrderNotFound(r)) if r == "42"));
    }
}
