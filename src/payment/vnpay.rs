//! VNPay redirect signing and callback verification.
//!
//! Both directions sign the same canonical string: parameters sorted by
//! key, values form-urlencoded, joined with `&`, HMAC-SHA512 in lowercase hex.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use url::form_urlencoded;

use crate::domain::aggregates::Order;
use crate::payment::GatewayCallback;
use crate::{CommerceError, Result};

type HmacSha512 = Hmac<Sha512>;

pub const SECURE_HASH: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
pub const DEFAULT_PAY_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";

const VERSION: &str = "2.1.0";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
/// VNPay reads timestamps as Vietnam local time.
const VIETNAM_OFFSET_HOURS: i64 = 7;

#[derive(Clone, Debug)]
pub struct VnPayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: String,
    pub return_url: String,
    pub expire_minutes: i64,
}

#[derive(Clone, Debug)]
pub struct VnPayGateway {
    config: VnPayConfig,
}

impl VnPayGateway {
    pub fn new(config: VnPayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VnPayConfig {
        &self.config
    }

    /// Signed URL the customer is redirected to for an online order.
    pub fn build_redirect_url(&self, order: &Order, client_ip: &str, now: DateTime<Utc>) -> Result<String> {
        let order_ref = order.id().simple().to_string();
        let mut params = BTreeMap::new();
        params.insert("vnp_Version", VERSION.to_string());
        params.insert("vnp_Command", "pay".to_string());
        params.insert("vnp_TmnCode", self.config.tmn_code.clone());
        params.insert("vnp_Amount", order.total().minor_units().to_string());
        params.insert("vnp_CurrCode", "VND".to_string());
        params.insert("vnp_TxnRef", order_ref.clone());
        params.insert("vnp_OrderInfo", format!("Thanh toan don hang {order_ref}"));
        params.insert("vnp_OrderType", "other".to_string());
        params.insert("vnp_Locale", "vn".to_string());
        params.insert("vnp_ReturnUrl", self.config.return_url.clone());
        params.insert("vnp_IpAddr", client_ip.to_string());
        params.insert("vnp_CreateDate", vietnam_timestamp(now));
        params.insert("vnp_ExpireDate", vietnam_timestamp(now + Duration::minutes(self.config.expire_minutes)));

        let query = canonical_query(params.iter().map(|(k, v)| (*k, v.as_str())));
        let signature = self.sign(&query)?;
        Ok(format!("{}?{query}&{SECURE_HASH}={signature}", self.config.pay_url))
    }

    pub fn sign(&self, canonical: &str) -> Result<String> {
        Ok(hex::encode(self.mac(canonical)?.finalize().into_bytes()))
    }

    /// Checks the signature over every parameter except the hash fields and
    /// extracts the outcome. The order itself is not consulted here.
    pub fn verify(&self, params: &HashMap<String, String>) -> Result<GatewayCallback> {
        let received = params.get(SECURE_HASH).ok_or(CommerceError::InvalidSignature)?;
        let received = hex::decode(received.trim()).map_err(|_| CommerceError::InvalidSignature)?;

        let signed: BTreeMap<&str, &str> = params
            .iter()
            .filter(|(k, _)| k.as_str() != SECURE_HASH && k.as_str() != SECURE_HASH_TYPE)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let canonical = canonical_query(signed.into_iter());
        self.mac(&canonical)?.verify_slice(&received).map_err(|_| CommerceError::InvalidSignature)?;

        let field = |name: &str| {
            params
                .get(name)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| CommerceError::Validation(format!("missing {name}")))
        };
        let amount = field("vnp_Amount")?;
        Ok(GatewayCallback {
            order_ref: field("vnp_TxnRef")?,
            response_code: field("vnp_ResponseCode")?,
            amount_minor: amount
                .parse()
                .map_err(|_| CommerceError::Validation(format!("invalid vnp_Amount: {amount}")))?,
            transaction_no: params.get("vnp_TransactionNo").cloned(),
        })
    }

    fn mac(&self, data: &str) -> Result<HmacSha512> {
        let mut mac = HmacSha512::new_from_slice(self.config.hash_secret.as_bytes())
            .map_err(|e| CommerceError::Validation(format!("unusable VNPay hash secret: {e}")))?;
        mac.update(data.as_bytes());
        Ok(mac)
    }
}

/// `key=value&...` in iteration order with values form-urlencoded.
pub fn canonical_query<'a>(params: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    params
        .map(|(k, v)| format!("{k}={}", form_urlencoded::byte_serialize(v.as_bytes()).collect::<String>()))
        .collect::<Vec<_>>()
        .join("&")
}

fn vietnam_timestamp(at: DateTime<Utc>) -> String {
    (at.naive_utc() + Duration::hours(VIETNAM_OFFSET_HOURS)).format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;
    use crate::domain::aggregates::{OrderDetail, PaymentMethod};
    use crate::domain::value_objects::{ContactSnapshot, Money};

    fn gateway() -> VnPayGateway {
        VnPayGateway::new(VnPayConfig {
            tmn_code: "PHARMA01".into(),
            hash_secret: "SECRETKEY".into(),
            pay_url: DEFAULT_PAY_URL.into(),
            return_url: "https://shop.example.vn/vnpay-return".into(),
            expire_minutes: 15,
        })
    }

    fn order() -> Order {
        let details = vec![OrderDetail {
            id: Uuid::new_v4(), product_id: Uuid::new_v4(), product_title: "Paracetamol".into(),
            quantity: 2, price_at_order: Money::new(10_000),
        }];
        Order::place(Uuid::new_v4(), "an@example.vn", ContactSnapshot::default(), None, PaymentMethod::VnPay, details)
    }

    fn query_params(url: &str) -> HashMap<String, String> {
        let parsed = url::Url::parse(url).unwrap();
        parsed.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect()
    }

    #[test]
    fn test_signature_matches_reference_vector() {
        let query = canonical_query(
            [("vnp_Amount", "2000000"), ("vnp_OrderInfo", "Thanh toan don hang"), ("vnp_TxnRef", "abc")].into_iter(),
        );
        assert_eq!(query, "vnp_Amount=2000000&vnp_OrderInfo=Thanh+toan+don+hang&vnp_TxnRef=abc");
        assert_eq!(
            gateway().sign(&query).unwrap(),
            "b7d9a8cf54b6e6d5d419abf5c4ca8565813cfb0d2202d857c07142ca9ae6bb2b\
             eba3dda9f001acfe3d17117f1e8f3849e285b50285e0962435244c11f43d2399"
        );
    }

    #[test]
    fn test_redirect_url_carries_sorted_signed_parameters() {
        let order = order();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 17, 30, 0).unwrap();
        let url = gateway().build_redirect_url(&order, "10.0.0.7", now).unwrap();
        assert!(url.starts_with(DEFAULT_PAY_URL));

        let query = url.split_once('?').unwrap().1;
        let keys: Vec<&str> = query.split('&').map(|kv| kv.split('=').next().unwrap()).collect();
        let mut sorted = keys[..keys.len() - 1].to_vec();
        sorted.sort();
        assert_eq!(&keys[..keys.len() - 1], sorted.as_slice());
        assert_eq!(keys.last(), Some(&SECURE_HASH));

        let params = query_params(&url);
        assert_eq!(params["vnp_Amount"], "2000000");
        assert_eq!(params["vnp_TxnRef"], order.id().simple().to_string());
        assert_eq!(params["vnp_CreateDate"], "20240302003000");
        assert_eq!(params["vnp_ExpireDate"], "20240302004500");
        assert_eq!(params["vnp_IpAddr"], "10.0.0.7");
    }

    fn callback(order: &Order, code: &str) -> HashMap<String, String> {
        let gw = gateway();
        let mut params: BTreeMap<&str, String> = BTreeMap::new();
        params.insert("vnp_Amount", order.total().minor_units().to_string());
        params.insert("vnp_ResponseCode", code.to_string());
        params.insert("vnp_TxnRef", order.id().simple().to_string());
        params.insert("vnp_TransactionNo", "14012345".to_string());
        params.insert("vnp_OrderInfo", "Thanh toan don hang".to_string());
        let signature = gw.sign(&canonical_query(params.iter().map(|(k, v)| (*k, v.as_str())))).unwrap();
        let mut out: HashMap<String, String> = params.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        out.insert(SECURE_HASH.into(), signature);
        out.insert(SECURE_HASH_TYPE.into(), "HmacSHA512".into());
        out
    }

    #[test]
    fn test_verify_accepts_signed_callback() {
        let order = order();
        let verified = gateway().verify(&callback(&order, "00")).unwrap();
        assert!(verified.approved());
        assert_eq!(verified.amount_minor, 2_000_000);
        assert_eq!(verified.order_id().unwrap(), order.id());
        assert_eq!(verified.transaction_no.as_deref(), Some("14012345"));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let order = order();
        let mut params = callback(&order, "00");
        params.insert("vnp_Amount".into(), "100".into());
        assert!(matches!(gateway().verify(&params), Err(CommerceError::InvalidSignature)));

        let mut params = callback(&order, "24");
        params.remove(SECURE_HASH);
        assert!(matches!(gateway().verify(&params), Err(CommerceError::InvalidSignature)));

        let mut params = callback(&order, "00");
        params.insert(SECURE_HASH.into(), "not-hex".into());
        assert!(matches!(gateway().verify(&params), Err(CommerceError::InvalidSignature)));
    }

    #[test]
    fn test_verify_accepts_uppercase_signature() {
        let order = order();
        let mut params = callback(&order, "00");
        let upper = params[SECURE_HASH].to_uppercase();
        params.insert(SECURE_HASH.into(), upper);
        assert!(gateway().verify(&params).is_ok());
    }
}
