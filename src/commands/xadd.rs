use crate::stream::RequestedId;

use super::error::CommandError;

/// Arguments of `XADD key id field value [field value ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct XaddArguments {
    pub key: String,
    pub requested_id: RequestedId,
    pub fields: Vec<(String, String)>,
}

impl XaddArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 4 || (arguments.len() - 2) % 2 != 0 {
            return Err(CommandError::InvalidXAddCommand);
        }

        let requested_id = RequestedId::parse(&arguments[1])?;
        let fields = arguments[2..]
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();

        Ok(XaddArguments {
            key: arguments[0].clone(),
            requested_id,
            fields,
        })
    }
}
