//! Signaling-Frames
//!
//! Auf einer Verbindung teilen sich Signaling-JSON und getunnelter
//! Medien-Datenverkehr einen Byte-Stream. Jeder eingehende Chunk wird genau
//! einmal klassifiziert:
//!
//! - JSON-Objekt mit `requestId` (UUID), `method`, `path` und Objekt `data` -> Request
//! - JSON-Objekt mit `requestId` (UUID) und ganzzahligem `status` -> Response
//! - alles andere (auch ungueltiges JSON) -> Tunnel
//!
//! Die Routing-Entscheidung liegt danach allein bei der Session.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ProtocolResult;

/// Status: angenommen
pub const STATUS_OK: u16 = 200;
/// Status: fehlerhaft oder nicht authentifiziert
pub const STATUS_BAD_REQUEST: u16 = 400;
/// Status: aufgrund der Mute-Liste abgelehnt
pub const STATUS_FORBIDDEN: u16 = 403;

/// Methode aller Session-Pfade
pub const METHOD_POST: &str = "POST";

pub const PFAD_NOTIFY: &str = "/session/notify";
pub const PFAD_ACCEPT: &str = "/session/accept";
pub const PFAD_DISCONNECT: &str = "/session/disconnect";

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/// Signaling-Anfrage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_id: Uuid,
    pub method: String,
    pub path: String,
    pub data: Map<String, Value>,
}

impl Request {
    /// Erstellt eine neue Anfrage mit prozessweit eindeutiger ID (UUID v4)
    pub fn neu(method: impl Into<String>, path: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            method: method.into(),
            path: path.into(),
            data,
        }
    }

    /// Serialisiert die Anfrage als ein Chunk
    pub fn kodieren(&self) -> ProtocolResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn route(&self) -> Route {
        Route::bestimmen(&self.method, &self.path)
    }
}

/// Signaling-Antwort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub request_id: Uuid,
    pub status: u16,
}

impl Response {
    pub fn neu(request_id: Uuid, status: u16) -> Self {
        Self { request_id, status }
    }

    /// Serialisiert die Antwort als ein Chunk
    pub fn kodieren(&self) -> ProtocolResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// Ziel einer Anfrage anhand von `(method, path)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Notify,
    Accept,
    Disconnect,
    /// Wird mit 400 beantwortet, die Session laeuft weiter
    Unbekannt,
}

impl Route {
    pub fn bestimmen(method: &str, path: &str) -> Self {
        match (method, path) {
            (METHOD_POST, PFAD_NOTIFY) => Self::Notify,
            (METHOD_POST, PFAD_ACCEPT) => Self::Accept,
            (METHOD_POST, PFAD_DISCONNECT) => Self::Disconnect,
            _ => Self::Unbekannt,
        }
    }
}

// ---------------------------------------------------------------------------
// Frame-Klassifizierung
// ---------------------------------------------------------------------------

/// Ein klassifizierter Chunk
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Request(Request),
    Response(Response),
    /// Roher Tunnel-Datenverkehr, unveraendert
    Tunnel(Bytes),
}

impl Frame {
    /// Klassifiziert einen eingehenden Chunk
    pub fn klassifizieren(chunk: Bytes) -> Self {
        let Ok(Value::Object(objekt)) = serde_json::from_slice::<Value>(&chunk) else {
            return Self::Tunnel(chunk);
        };

        if let Some(request) = als_request(&objekt) {
            return Self::Request(request);
        }
        if let Some(response) = als_response(&objekt) {
            return Self::Response(response);
        }
        Self::Tunnel(chunk)
    }
}

fn request_id(objekt: &Map<String, Value>) -> Option<Uuid> {
    objekt
        .get("requestId")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn als_request(objekt: &Map<String, Value>) -> Option<Request> {
    let request_id = request_id(objekt)?;
    let method = objekt.get("method")?.as_str().filter(|m| !m.is_empty())?;
    let path = objekt.get("path")?.as_str().filter(|p| !p.is_empty())?;
    let data = objekt.get("data")?.as_object()?;

    Some(Request {
        request_id,
        method: method.to_owned(),
        path: path.to_owned(),
        data: data.clone(),
    })
}

fn als_response(objekt: &Map<String, Value>) -> Option<Response> {
    let request_id = request_id(objekt)?;
    let status = objekt
        .get("status")?
        .as_u64()
        .filter(|s| *s != 0)
        .and_then(|s| u16::try_from(s).ok())?;

    Some(Response { request_id, status })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(v: Value) -> Bytes {
        Bytes::from(serde_json::to_vec(&v).unwrap())
    }

    #[test]
    fn request_wird_erkannt() {
        let id = Uuid::new_v4();
        let frame = Frame::klassifizieren(chunk(json!({
            "requestId": id.to_string(),
            "method": "POST",
            "path": "/session/notify",
            "data": { "x": 1 }
        })));

        let Frame::Request(req) = frame else {
            panic!("Request erwartet");
        };
        assert_eq!(req.request_id, id);
        assert_eq!(req.route(), Route::Notify);
        assert_eq!(req.data["x"], 1);
    }

    #[test]
    fn response_wird_erkannt() {
        let id = Uuid::new_v4();
        let frame = Frame::klassifizieren(chunk(json!({
            "requestId": id.to_string(),
            "status": 403
        })));
        assert_eq!(frame, Frame::Response(Response::neu(id, STATUS_FORBIDDEN)));
    }

    #[test]
    fn ungueltiges_json_ist_tunnel() {
        let raw = Bytes::from_static(b"{not json");
        assert_eq!(Frame::klassifizieren(raw.clone()), Frame::Tunnel(raw));
    }

    #[test]
    fn binaerdaten_sind_tunnel() {
        let raw = Bytes::from_static(&[0x80, 0x00, 0xff, 0x13, 0x37]);
        assert_eq!(Frame::klassifizieren(raw.clone()), Frame::Tunnel(raw));
    }

    #[test]
    fn json_ohne_frame_form_ist_tunnel() {
        // requestId keine UUID
        let a = chunk(json!({ "requestId": "abc", "status": 200 }));
        assert!(matches!(Frame::klassifizieren(a), Frame::Tunnel(_)));

        // data kein Objekt
        let b = chunk(json!({
            "requestId": Uuid::new_v4().to_string(),
            "method": "POST",
            "path": "/session/notify",
            "data": [1, 2]
        }));
        assert!(matches!(Frame::klassifizieren(b), Frame::Tunnel(_)));

        // Status als String
        let c = chunk(json!({ "requestId": Uuid::new_v4().to_string(), "status": "200" }));
        assert!(matches!(Frame::klassifizieren(c), Frame::Tunnel(_)));

        // kein Objekt
        assert!(matches!(Frame::klassifizieren(chunk(json!([1, 2, 3]))), Frame::Tunnel(_)));
    }

    #[test]
    fn kodieren_nutzt_wire_feldnamen() {
        let req = Request::neu(METHOD_POST, PFAD_ACCEPT, Map::new());
        let wert: Value = serde_json::from_slice(&req.kodieren().unwrap()).unwrap();
        assert_eq!(wert["requestId"], req.request_id.to_string());
        assert_eq!(wert["method"], "POST");
        assert_eq!(wert["path"], "/session/accept");

        let resp = Response::neu(req.request_id, STATUS_OK);
        let wert: Value = serde_json::from_slice(&resp.kodieren().unwrap()).unwrap();
        assert_eq!(wert, json!({ "requestId": req.request_id.to_string(), "status": 200 }));
    }

    #[test]
    fn request_ids_eindeutig() {
        let a = Request::neu(METHOD_POST, PFAD_NOTIFY, Map::new());
        let b = Request::neu(METHOD_POST, PFAD_NOTIFY, Map::new());
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn unbekannte_route() {
        assert_eq!(Route::bestimmen("GET", PFAD_NOTIFY), Route::Unbekannt);
        assert_eq!(Route::bestimmen("POST", "/api/file"), Route::Unbekannt);
        assert_eq!(Route::bestimmen("POST", PFAD_DISCONNECT), Route::Disconnect);
    }
}
