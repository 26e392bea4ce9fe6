#![allow(dead_code)]

use bloom_pay::config::normalize_base_url;
use bloom_pay::domain::intent::{Amount, DonationRequest};
use bloom_pay::infrastructure::http::HttpPaymentGateway;
use reqwest::Client;
use serde_json::{Value, json};
use std::net::TcpListener;
use wiremock::MockServer;

pub fn request(amount: u64) -> DonationRequest {
    DonationRequest::new(Amount::try_from(amount).unwrap())
}

pub fn api_url(server: &MockServer) -> String {
    format!("{}/api/", server.uri())
}

pub fn http_gateway(server: &MockServer) -> HttpPaymentGateway {
    HttpPaymentGateway::with_client(normalize_base_url(&api_url(server)).unwrap(), Client::new())
}

/// A gateway pointed at a local port nothing is listening on.
pub fn unreachable_gateway() -> HttpPaymentGateway {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let base = normalize_base_url(&format!("http://{}/api/", addr)).unwrap();
    HttpPaymentGateway::with_client(base, Client::new())
}

pub fn envelope(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

pub fn failure(message: &str) -> Value {
    json!({ "success": false, "message": message })
}

pub fn transfer_details(reference: &str, amount: u64) -> Value {
    envelope(json!({
        "donation_id": "5f0c7d1e",
        "reference": reference,
        "amount": amount as f64,
        "bank_name": "Wema Bank",
        "account_number": "7810293847",
        "account_name": "Bloom Foundation",
        "payment_url": null,
        "expires_at": "2026-10-16T12:30:00Z",
    }))
}

pub fn not_paid() -> Value {
    envelope(json!({
        "status": "pending",
        "is_paid": false,
        "message": "Payment not yet received. Please ensure you have completed the transfer.",
    }))
}

pub fn paid(amount: u64) -> Value {
    envelope(json!({
        "status": "confirmed",
        "is_paid": true,
        "donation_id": "5f0c7d1e",
        "amount": amount as f64,
        "message": "Payment confirmed! Thank you for your generous donation.",
    }))
}

pub fn recent(donors: &[(&str, u64)]) -> Value {
    let list: Vec<Value> = donors
        .iter()
        .map(|(name, amount)| {
            json!({
                "donor_name": name,
                "amount_naira": format!("{}.00", amount),
                "confirmed_at": "2026-10-16T12:00:00Z",
            })
        })
        .collect();
    envelope(Value::Array(list))
}
