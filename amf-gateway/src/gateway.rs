//! The message handler: one request envelope in, one response envelope out.

use crate::acl::Acl;
use crate::amf0::write::Amf0Encoder;
use crate::amf3::custom_encoder::{ExternalDecoderFn, ExternalEncoder};
use crate::auth::Authenticator;
use crate::errors::{DispatchError, EncodeError, Fault, GatewayError};
use crate::messaging::{
    AcknowledgeMessage, CommandMessage, ErrorMessage, RemotingMessage, COMMAND_CLIENT_PING,
    COMMAND_DISCONNECT, COMMAND_LOGIN, COMMAND_LOGOUT,
};
use crate::packet::read::PacketDecoder;
use crate::packet::{write, Body, Header, Packet};
use crate::registry::ClassRegistry;
use crate::service::{
    cast_arguments, DispatchTable, Invocable, ServiceDefinition, ServiceLoader,
};
use crate::types::{AmfVersion, Element, Value};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, warn};

/// Header carrying userid/password credentials for the whole packet
pub const CREDENTIALS_HEADER: &str = "Credentials";
/// Response header instructing the client to pin or replace a header
pub const REQUEST_PERSISTENT_HEADER: &str = "RequestPersistentHeader";
/// Response header carrying a session suffix for the gateway URL
pub const APPEND_TO_GATEWAY_URL: &str = "AppendToGatewayUrl";
/// Response target suffix for a successful body
pub const ON_RESULT: &str = "/onResult";
/// Response target suffix for a failed body
pub const ON_STATUS: &str = "/onStatus";
/// The role unauthenticated callers act under, when the ACL knows it
pub const GUEST_ROLE: &str = "GuestRole";

/// The remoting gateway.
///
/// Owns the dispatch table, the class-alias registry and the optional
/// policy collaborators. One gateway serves one packet at a time; run one
/// gateway per thread for parallelism.
pub struct Gateway {
    dispatch: DispatchTable,
    registry: ClassRegistry,
    acl: Option<Acl>,
    authenticator: Option<Box<dyn Authenticator>>,
    loader: Option<Box<dyn ServiceLoader>>,
    production: bool,
    external_decoders: HashMap<String, ExternalDecoderFn>,
    external_encoders: HashMap<String, Rc<dyn ExternalEncoder>>,
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    /// A gateway with an empty dispatch table and default registry.
    pub fn new() -> Self {
        Self {
            dispatch: DispatchTable::new(),
            registry: ClassRegistry::default(),
            acl: None,
            authenticator: None,
            loader: None,
            production: false,
            external_decoders: HashMap::new(),
            external_encoders: HashMap::new(),
        }
    }

    /// Enforce access control with `acl`.
    pub fn with_acl(mut self, acl: Acl) -> Self {
        self.acl = Some(acl);
        self
    }

    /// Authenticate through `authenticator`.
    pub fn with_authenticator(mut self, authenticator: Box<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Resolve unknown source classes through `loader`.
    pub fn with_loader(mut self, loader: Box<dyn ServiceLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Replace the class-alias registry.
    pub fn with_registry(mut self, registry: ClassRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// In production mode error descriptions are emptied before they reach
    /// the client.
    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// Map a wire class alias to a server class id.
    pub fn set_class_mapping(&mut self, wire_alias: &str, server_class: &str) {
        self.registry.set_mapping(wire_alias, server_class);
    }

    /// Register a body decoder and encoder pair for an externalizable
    /// class.
    pub fn register_external(
        &mut self,
        class_name: &str,
        decoder: ExternalDecoderFn,
        encoder: Rc<dyn ExternalEncoder>,
    ) {
        self.external_decoders.insert(class_name.to_string(), decoder);
        self.external_encoders.insert(class_name.to_string(), encoder);
    }

    /// Register every method of a service class.
    pub fn register_service(
        &mut self,
        namespace: Option<&str>,
        service: ServiceDefinition,
    ) -> Result<(), DispatchError> {
        self.dispatch.register_service(namespace, service)
    }

    /// Register a free function.
    pub fn register_function(
        &mut self,
        namespace: Option<&str>,
        invocable: Invocable,
    ) -> Result<(), DispatchError> {
        self.dispatch.register_function(namespace, invocable)
    }

    /// Serve one request envelope.
    ///
    /// Every post-parse failure is isolated to its body and answered with
    /// an error body; only an unparseable envelope yields `Err`, and then
    /// no response bytes exist.
    pub fn serve(&mut self, request: &[u8]) -> Result<Vec<u8>, GatewayError> {
        let mut decoder = PacketDecoder::new(self.registry.clone());
        decoder.amf0.external_decoders = self.external_decoders.clone();
        let packet = decoder
            .parse(request)
            .map_err(|e| GatewayError::MalformedRequest(format!("{e:?}")))?;

        debug!(
            version = %packet.version,
            headers = packet.headers.len(),
            bodies = packet.bodies.len(),
            "request parsed"
        );

        let mut response = Packet {
            // the response speaks whatever the request spoke
            version: packet.version,
            headers: Vec::new(),
            bodies: Vec::new(),
        };

        let mut packet_fault = None;
        if let Some(header) = packet.headers.iter().find(|h| h.name == CREDENTIALS_HEADER) {
            match self.process_credentials(&header.value) {
                Ok(()) => response.headers.push(clear_credentials_header()),
                Err(fault) => packet_fault = Some(fault),
            }
        }

        let amf3 = packet.version == AmfVersion::Amf3;
        for body in &packet.bodies {
            response
                .bodies
                .push(self.dispatch_body(body, amf3, packet_fault.as_ref()));
        }

        let mut encoder = Amf0Encoder::new(self.registry.clone());
        encoder.external_encoders = self.external_encoders.clone();
        Ok(write::write_to_bytes(&response, &mut encoder)?)
    }

    /// Authenticate the packet-level credentials header.
    fn process_credentials(&mut self, value: &Rc<Value>) -> Result<(), Fault> {
        let userid = value
            .field("userid")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let password = value
            .field("password")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let authenticator = self
            .authenticator
            .as_mut()
            .ok_or_else(|| Fault::auth("No authentication handler configured"))?;
        authenticator.set_credentials(&userid, &password);
        let result = authenticator.authenticate();
        if result.valid {
            Ok(())
        } else {
            warn!(userid = %userid, "credentials rejected");
            Err(Fault::auth(result.messages.join("; ")))
        }
    }

    fn dispatch_body(&mut self, body: &Body, amf3: bool, packet_fault: Option<&Fault>) -> Body {
        // look through the AMF0 escape wrapper
        let value = match &*body.value {
            Value::Amf3(inner) => Rc::clone(inner),
            _ => Rc::clone(&body.value),
        };

        // a packet-level auth failure answers every body
        if let Some(fault) = packet_fault {
            return self.error_body(body, amf3, fault.clone(), None);
        }

        if let Some(command) = CommandMessage::from_value(&value) {
            return match self.run_command(&command) {
                Ok(ack) => self.result_body(body, amf3, ack),
                Err(fault) => self.error_body(body, amf3, fault, Some(&command.message_id)),
            };
        }

        if let Some(message) = RemotingMessage::from_value(&value) {
            return match self.invoke_method(&message.source, &message.operation, message.body.clone())
            {
                Ok(result) => {
                    let ack = AcknowledgeMessage::new(message.message_id.clone(), result);
                    self.result_body(body, amf3, ack.into_value())
                }
                Err(fault) => self.error_body(body, amf3, fault, Some(&message.message_id)),
            };
        }

        // a plain call names its target in the URI and carries the
        // arguments as the body payload
        let (source, method) = split_target(&body.target_uri);
        let args = match &*value {
            Value::StrictArray(items) => items.clone(),
            Value::Null | Value::Undefined => Vec::new(),
            _ => vec![Rc::clone(&value)],
        };

        match self.invoke_method(source, method, args) {
            Ok(result) => self.result_body(body, amf3, result),
            Err(fault) => self.error_body(body, amf3, fault, None),
        }
    }

    /// The command state machine; stateless per call.
    fn run_command(&mut self, command: &CommandMessage) -> Result<Rc<Value>, Fault> {
        match command.operation {
            COMMAND_CLIENT_PING | COMMAND_DISCONNECT => Ok(AcknowledgeMessage::new(
                command.message_id.clone(),
                Rc::new(Value::Null),
            )
            .into_value()),
            COMMAND_LOGIN => {
                let encoded = command
                    .body
                    .as_str()
                    .ok_or_else(|| Fault::auth("Malformed login body"))?;
                let decoded = STANDARD
                    .decode(encoded)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                    .ok_or_else(|| Fault::auth("Malformed login body"))?;
                let (userid, password) = decoded
                    .split_once(':')
                    .ok_or_else(|| Fault::auth("Malformed login body"))?;

                let authenticator = self
                    .authenticator
                    .as_mut()
                    .ok_or_else(|| Fault::auth("No authentication handler configured"))?;
                authenticator.set_credentials(userid, password);
                let result = authenticator.authenticate();
                if !result.valid {
                    return Err(Fault::auth(result.messages.join("; ")));
                }

                // a token-bearing identity echoes "id:token" to the client
                let body = match result
                    .identity
                    .as_ref()
                    .and_then(|identity| identity.token.as_deref())
                {
                    Some(token) => {
                        let id = result
                            .identity
                            .as_ref()
                            .map(|identity| identity.id.as_str())
                            .unwrap_or_default();
                        Rc::new(Value::String(format!("{id}:{token}")))
                    }
                    None => Rc::new(Value::Null),
                };
                Ok(AcknowledgeMessage::new(command.message_id.clone(), body).into_value())
            }
            COMMAND_LOGOUT => {
                if let Some(authenticator) = self.authenticator.as_mut() {
                    authenticator.clear_identity();
                }
                Ok(
                    AcknowledgeMessage::new(command.message_id.clone(), Rc::new(Value::Null))
                        .into_value(),
                )
            }
            operation => Err(Fault::processing(format!(
                "CommandMessage::{operation} not implemented"
            ))),
        }
    }

    /// Resolve and call one method.
    fn invoke_method(
        &mut self,
        source: &str,
        method: &str,
        mut args: Vec<Rc<Value>>,
    ) -> Result<Rc<Value>, Fault> {
        // the source may arrive as a wire alias
        let source = self.registry.resolve_incoming(source).to_string();
        let qualified_name = if source.is_empty() {
            method.to_string()
        } else {
            format!("{source}.{method}")
        };

        if self.dispatch.lookup(&qualified_name).is_none() && !source.is_empty() {
            if let Some(service) = self.loader.as_ref().and_then(|l| l.load(&source)) {
                self.dispatch
                    .register_service(None, service)
                    .map_err(|e| Fault::processing(e.to_string()))?;
            }
        }

        let Some(invocable) = self.dispatch.lookup(&qualified_name) else {
            warn!(method = %qualified_name, "dispatch miss");
            return Err(Fault::method_missing(method));
        };

        args.extend(invocable.fixed_args.iter().cloned());
        cast_arguments(&mut args, &invocable.prototypes);

        self.check_access(&source, method)?;

        debug!(method = %qualified_name, args = args.len(), "invoking");
        invocable.invoke(&args)
    }

    /// Evaluate the ACL for one call; absent ACL means no enforcement.
    fn check_access(&self, source: &str, method: &str) -> Result<(), Fault> {
        let Some(acl) = &self.acl else {
            return Ok(());
        };

        let identity_role = self
            .authenticator
            .as_ref()
            .and_then(|a| a.get_identity())
            .map(|identity| identity.role.clone());
        let role = match identity_role {
            Some(role) => role,
            None if acl.has_role(GUEST_ROLE) => GUEST_ROLE.to_string(),
            None => return Err(Fault::authorization(source, method)),
        };

        let resource = (!source.is_empty()).then_some(source);
        if acl.is_allowed(Some(&role), resource, Some(method)) {
            Ok(())
        } else {
            warn!(role = %role, source = %source, method = %method, "access denied");
            Err(Fault::authorization(source, method))
        }
    }

    fn result_body(&self, body: &Body, amf3: bool, value: Rc<Value>) -> Body {
        // a value the codec cannot express fails this body, not the packet
        if let Err(err) = self.trial_encode(&value) {
            return self.error_body(body, amf3, Fault::encoding(&err), None);
        }
        Body {
            target_uri: format!("{}{ON_RESULT}", body.response_uri),
            response_uri: String::new(),
            value: if amf3 { Rc::new(Value::Amf3(value)) } else { value },
        }
    }

    fn trial_encode(&self, value: &Rc<Value>) -> Result<(), EncodeError> {
        let mut encoder = Amf0Encoder::new(self.registry.clone());
        encoder.external_encoders = self.external_encoders.clone();
        let mut sink: Vec<u8> = Vec::new();
        encoder.write_value(&mut sink, value)
    }

    fn error_body(
        &self,
        body: &Body,
        amf3: bool,
        fault: Fault,
        correlation_id: Option<&str>,
    ) -> Body {
        warn!(target_uri = %body.target_uri, fault = %fault, "body failed");
        let fault = if self.production { fault.scrubbed() } else { fault };

        let value = if amf3 {
            let message = ErrorMessage::new(correlation_id.unwrap_or_default(), fault);
            Rc::new(Value::Amf3(message.into_value()))
        } else {
            error_record(&fault)
        };

        Body {
            target_uri: format!("{}{ON_STATUS}", body.response_uri),
            response_uri: String::new(),
            value,
        }
    }
}

/// The AMF0 error record for one fault.
fn error_record(fault: &Fault) -> Rc<Value> {
    Rc::new(Value::object(vec![
        Element::new("description", fault.description.as_str()),
        Element::new("detail", fault.detail.as_str()),
        Element::new("line", Value::Number(f64::from(fault.line))),
        Element::new("code", fault.code.as_str()),
        Element::new("level", "error"),
    ]))
}

/// The header clearing client-side credentials after a successful login.
fn clear_credentials_header() -> Header {
    Header {
        name: REQUEST_PERSISTENT_HEADER.to_string(),
        must_understand: false,
        value: Rc::new(Value::object(vec![
            Element::new("name", CREDENTIALS_HEADER),
            Element::new("mustUnderstand", false),
            Element::new("data", Value::Null),
        ])),
    }
}

/// Split a target URI on its last dot into (source, method).
fn split_target(target_uri: &str) -> (&str, &str) {
    match target_uri.rsplit_once('.') {
        Some((source, method)) => (source, method),
        None => ("", target_uri),
    }
}

#[cfg(test)]
mod tests {
    use super::split_target;

    #[test]
    fn targets_split_on_the_last_dot() {
        assert_eq!(split_target("Svc.foo"), ("Svc", "foo"));
        assert_eq!(split_target("com.example.Svc.foo"), ("com.example.Svc", "foo"));
        assert_eq!(split_target("bare"), ("", "bare"));
    }
}
