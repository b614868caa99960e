use crate::amf3::read::Amf3Decoder;
use crate::amf3::write::Amf3Encoder;
use crate::errors::EncodeError;
use crate::nom_utils::AmfResult;
use crate::types::{ClassDefinition, Element};
use std::rc::Rc;

/// Body encoding for an externalizable class.
///
/// The encoder is handed back so implementations can reuse the reference
/// tables of the enclosing packet.
pub trait ExternalEncoder {
    /// Encode the members of one externalizable instance.
    fn encode(
        &self,
        elements: &[Element],
        class_def: &Option<ClassDefinition>,
        encoder: &mut Amf3Encoder,
    ) -> Result<Vec<u8>, EncodeError>;
}

/// Body decoding for an externalizable class.
pub type ExternalDecoderFn =
    Rc<dyn for<'a> Fn(&'a [u8], &mut Amf3Decoder) -> AmfResult<'a, Vec<Element>>>;
