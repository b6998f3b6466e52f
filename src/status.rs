use crate::Error;

/// The outcome of an RPC invocation, carried on every [`RPCResponse`](crate::RPCResponse).
///
/// Numeric values are part of the wire contract and must not be renumbered;
/// note the deliberate gap at `3` and `8`, inherited from the protocol this
/// crate implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    /// Default/unset value. Never sent deliberately by this crate.
    Unknown = 0,
    /// The RPC succeeded (a.k.a. 200).
    Ok = 1,
    /// The (service, procedure) pair has no registered handler (a.k.a. 404).
    NotFound = 2,
    /// The handler ran and reported failure; see `error_message` (a.k.a. 500).
    NotOk = 4,
    /// An error occurred in the broker/worker implementation itself (a.k.a. 500).
    ServerError = 5,
    /// The request's deadline passed before a reply could be produced.
    Timeout = 6,
    /// The server is overloaded and shedding load (a.k.a. 503).
    OverloadedRetry = 7,
    /// Reserved for the client side: the request could not even be serialised.
    ClientRequestError = 9,
    /// Reserved for the client side: the request could not be sent.
    ClientNetworkError = 10,
    /// Reserved for the client side: a client API was called incorrectly.
    ClientCalledWrong = 11,
    /// The deadline carried by the request was missed somewhere in the call stack.
    MissedDeadline = 12,
    /// The server is in loadshedding mode and is not accepting requests.
    Loadshed = 13,
    /// A health check against the server failed.
    Unhealthy = 14,
}

impl Status {
    /// Returns the numeric wire value of this status.
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for Status {
    type Error = Error;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => Self::Unknown,
            1 => Self::Ok,
            2 => Self::NotFound,
            4 => Self::NotOk,
            5 => Self::ServerError,
            6 => Self::Timeout,
            7 => Self::OverloadedRetry,
            9 => Self::ClientRequestError,
            10 => Self::ClientNetworkError,
            11 => Self::ClientCalledWrong,
            12 => Self::MissedDeadline,
            13 => Self::Loadshed,
            14 => Self::Unhealthy,
            other => return Err(Error::InvalidStatus(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_defined_value() {
        let all = [
            Status::Unknown,
            Status::Ok,
            Status::NotFound,
            Status::NotOk,
            Status::ServerError,
            Status::Timeout,
            Status::OverloadedRetry,
            Status::ClientRequestError,
            Status::ClientNetworkError,
            Status::ClientCalledWrong,
            Status::MissedDeadline,
            Status::Loadshed,
            Status::Unhealthy,
        ];
        for s in all {
            assert_eq!(Status::try_from(s.as_u32()).unwrap(), s);
        }
    }

    #[test]
    fn rejects_the_gap_values() {
        assert!(Status::try_from(3).is_err());
        assert!(Status::try_from(8).is_err());
    }
}
