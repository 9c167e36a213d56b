//! M-Pesa STK push callback handling

use serde_json::{json, Value};
use subtle::ConstantTimeEq;

use crate::models::payment::{PaymentGateway, PaymentStatus};
use crate::services::webhook::{EventAction, GatewayEvent};
use crate::utils::errors::{Result, RivayaError};

pub const RESULT_SUCCESS: i64 = 0;
pub const RESULT_CANCELLED_BY_USER: i64 = 1032;

/// Body returned to Safaricom once a callback is accepted
pub fn acknowledgement() -> Value {
    json!({ "ResultCode": 0, "ResultDesc": "Accepted" })
}

/// Check the `?token=` query parameter against the configured callback token
pub fn authenticate(provided: Option<&str>, expected: Option<&str>) -> Result<()> {
    let expected = expected
        .ok_or_else(|| RivayaError::FeatureDisabled("M-Pesa callbacks are not configured".to_string()))?;
    match provided {
        Some(token) if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        _ => Err(RivayaError::WebhookSignature("Invalid callback token".to_string())),
    }
}

pub fn status_for_result(code: i64) -> PaymentStatus {
    match code {
        RESULT_SUCCESS => PaymentStatus::Completed,
        RESULT_CANCELLED_BY_USER => PaymentStatus::Cancelled,
        _ => PaymentStatus::Failed,
    }
}

/// Value of a named item in `CallbackMetadata.Item`
fn metadata_item<'a>(callback: &'a Value, name: &str) -> Option<&'a Value> {
    callback
        .pointer("/CallbackMetadata/Item")?
        .as_array()?
        .iter()
        .find(|item| item.get("Name").and_then(Value::as_str) == Some(name))
        .and_then(|item| item.get("Value"))
}

fn result_code(callback: &Value) -> Option<i64> {
    let code = callback.get("ResultCode")?;
    code.as_i64().or_else(|| code.as_str().and_then(|s| s.parse().ok()))
}

/// Interpret an `stkCallback` object
pub fn parse_stk_callback(callback: &Value, payload: Value) -> Result<GatewayEvent> {
    let checkout_id = callback
        .get("CheckoutRequestID")
        .and_then(Value::as_str)
        .ok_or_else(|| RivayaError::Validation("Callback without CheckoutRequestID".to_string()))?
        .to_string();
    let code = result_code(callback)
        .ok_or_else(|| RivayaError::Validation("Callback without ResultCode".to_string()))?;
    let status = status_for_result(code);

    let receipt = metadata_item(callback, "MpesaReceiptNumber").cloned();
    let gateway_response = json!({
        "resultCode": code,
        "resultDesc": callback.get("ResultDesc").cloned().unwrap_or(Value::Null),
        "merchantRequestId": callback.get("MerchantRequestID").cloned().unwrap_or(Value::Null),
        "mpesaReceiptNumber": receipt.unwrap_or(Value::Null),
        "amount": metadata_item(callback, "Amount").cloned().unwrap_or(Value::Null),
        "phoneNumber": metadata_item(callback, "PhoneNumber").cloned().unwrap_or(Value::Null),
    });

    Ok(GatewayEvent {
        gateway: PaymentGateway::Mpesa,
        event_id: checkout_id.clone(),
        event_type: format!("stk_callback.{}", code),
        action: EventAction::Transition {
            transaction_id: checkout_id,
            status,
        },
        gateway_response: Some(gateway_response),
        payload,
    })
}

/// Parse a full callback body, `{"Body": {"stkCallback": {...}}}`
pub fn parse_callback(body: Value) -> Result<GatewayEvent> {
    let callback = body
        .pointer("/Body/stkCallback")
        .cloned()
        .ok_or_else(|| RivayaError::Validation("Callback without Body.stkCallback".to_string()))?;

    parse_stk_callback(&callback, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback(code: i64) -> Value {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": code,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "Amount", "Value": 1500.00},
                            {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                            {"Name": "PhoneNumber", "Value": 254708374149u64}
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn test_result_codes() {
        assert_eq!(status_for_result(0), PaymentStatus::Completed);
        assert_eq!(status_for_result(1032), PaymentStatus::Cancelled);
        assert_eq!(status_for_result(1), PaymentStatus::Failed);
        assert_eq!(status_for_result(2001), PaymentStatus::Failed);
    }

    #[test]
    fn test_parse_successful_callback() {
        let event = parse_callback(callback(0)).unwrap();
        assert_eq!(event.event_id, "ws_CO_191220191020363925");
        assert_eq!(event.gateway, PaymentGateway::Mpesa);
        match event.action {
            EventAction::Transition { transaction_id, status } => {
                assert_eq!(transaction_id, "ws_CO_191220191020363925");
                assert_eq!(status, PaymentStatus::Completed);
            }
            EventAction::Ignore => panic!("callback should map"),
        }
        let response = event.gateway_response.unwrap();
        assert_eq!(response["mpesaReceiptNumber"], "NLJ7RT61SV");
    }

    #[test]
    fn test_malformed_callback_rejected() {
        assert!(parse_callback(json!({"Body": {}})).is_err());
        assert!(parse_callback(json!({"Body": {"stkCallback": {"ResultCode": 0}}})).is_err());
    }

    #[test]
    fn test_callback_token() {
        assert!(authenticate(Some("s3cret"), Some("s3cret")).is_ok());
        assert!(authenticate(Some("wrong"), Some("s3cret")).is_err());
        assert!(authenticate(Some("s3cre"), Some("s3cret")).is_err());
        assert!(authenticate(Some("s3cret-and-more"), Some("s3cret")).is_err());
        assert!(authenticate(None, Some("s3cret")).is_err());
        assert!(matches!(
            authenticate(Some("s3cret"), None),
            Err(RivayaError::FeatureDisabled(_))
        ));
    }

    #[test]
    fn test_acknowledgement_shape() {
        let ack = acknowledgement();
        assert_eq!(ack["ResultCode"], 0);
        assert_eq!(ack["ResultDesc"], "Accepted");
    }
}
