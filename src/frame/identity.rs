//! Identity of a resumable routine.
//!
//! Wire layout (after the `StateMachine` tag):
//! ```text
//! declaring type : string
//! member name    : string
//! param count    : i32
//! param types    : string × count
//! ```

use std::fmt;

use crate::error::{Result, TaskwireError};
use crate::protocol::{WireReader, WireWriter};

/// `(declaring type, member, parameter types)` of a resumable routine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetIdentity {
    declaring_type: String,
    member: String,
    parameters: Vec<String>,
}

impl TargetIdentity {
    /// Identity of a routine taking no parameters.
    pub fn new(declaring_type: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            member: member.into(),
            parameters: Vec::new(),
        }
    }

    /// Set the parameter type names, in declaration order.
    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    #[inline]
    pub fn member(&self) -> &str {
        &self.member
    }

    #[inline]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Append the identity record.
    pub fn encode(&self, out: &mut WireWriter) -> Result<()> {
        let count = i32::try_from(self.parameters.len()).map_err(|_| {
            TaskwireError::unclassifiable(self, "<parameters>", "too many parameters")
        })?;
        out.put_string(&self.declaring_type);
        out.put_string(&self.member);
        out.put_i32(count);
        for parameter in &self.parameters {
            out.put_string(parameter);
        }
        Ok(())
    }

    /// Read an identity record.
    pub fn decode(input: &mut WireReader<'_>) -> Result<Self> {
        let declaring_type = input.read_string()?;
        let member = input.read_string()?;
        let count_at = input.position();
        let count = input.read_i32()?;
        let count = usize::try_from(count).map_err(|_| {
            TaskwireError::malformed(count_at, "target identity", format!("negative parameter count {}", count))
        })?;
        // Each parameter needs at least its length byte.
        if count > input.remaining() {
            return Err(TaskwireError::malformed(
                count_at,
                "target identity",
                format!("parameter count {} exceeds remaining stream", count),
            ));
        }
        let mut parameters = Vec::with_capacity(count);
        for _ in 0..count {
            parameters.push(input.read_string()?);
        }
        Ok(Self {
            declaring_type,
            member,
            parameters,
        })
    }
}

impl fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}({})", self.declaring_type, self.member, self.parameters.join(", "))
    }
}
