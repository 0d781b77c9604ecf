// SPDX-License-Identifier: GPL-3.0-or-later

/// Define the properties of a request to a particular HTTP endpoint: its
/// expected successful status codes (sharing one output type) and its
/// failure status codes (each mapped to a named error variant).
///
/// Every endpoint additionally gets a `RateLimitExceeded` variant for
/// HTTP 429 and an `Endpoint` variant wrapping request-building/decoding
/// failures, since those can occur regardless of what the endpoint
/// itself declares.
macro_rules! EndpointDef {
  ( $name:ident,
    Ok => $out:ty, [$($(#[$ok_docs:meta])* $ok_status:ident,)*],
    Err => $err:ident, [$($(#[$err_docs:meta])* $err_status:ident => $variant:ident,)*] ) => {

    #[allow(unused_qualifications)]
    impl ::std::convert::From<(::hyper::http::StatusCode, ::std::vec::Vec<u8>)>
      for crate::endpoint::ConvertResult<$out, $err> {

      fn from(data: (::hyper::http::StatusCode, ::std::vec::Vec<u8>)) -> Self {
        let (status, body) = data;
        match status {
          $(
            ::hyper::http::StatusCode::$ok_status => {
              match <$name as crate::endpoint::Endpoint>::parse(&body) {
                Ok(obj) => crate::endpoint::ConvertResult(Ok(obj)),
                Err(err) => crate::endpoint::ConvertResult(Err(err)),
              }
            },
          )*
          $(
            ::hyper::http::StatusCode::$err_status => {
              let message = crate::endpoint::ErrorMessage::parse(&body);
              crate::endpoint::ConvertResult(Err($err::$variant(message)))
            },
          )*
          ::hyper::http::StatusCode::TOO_MANY_REQUESTS => {
            crate::endpoint::ConvertResult(Err($err::RateLimitExceeded))
          },
          status => {
            let message = crate::endpoint::ErrorMessage::parse(&body);
            crate::endpoint::ConvertResult(Err($err::UnexpectedStatus(status, message)))
          },
        }
      }
    }

    /// The errors this endpoint may report.
    #[allow(unused_qualifications)]
    #[derive(Debug)]
    pub enum $err {
      $(
        $(#[$err_docs])*
        $variant(::std::result::Result<crate::endpoint::ErrorMessage, ::std::vec::Vec<u8>>),
      )*
      /// The caller exceeded the server's rate limit.
      RateLimitExceeded,
      /// An HTTP status not covered by this endpoint's definition.
      UnexpectedStatus(
        ::hyper::http::StatusCode,
        ::std::result::Result<crate::endpoint::ErrorMessage, ::std::vec::Vec<u8>>,
      ),
      /// The endpoint-agnostic machinery failed (building the request,
      /// talking to the transport, or decoding the body).
      Endpoint(crate::endpoint::EndpointError),
    }

    #[allow(unused_qualifications)]
    impl ::std::fmt::Display for $err {
      fn fmt(&self, fmt: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        fn format_message(
          message: &::std::result::Result<crate::endpoint::ErrorMessage, ::std::vec::Vec<u8>>,
        ) -> String {
          match message {
            Ok(crate::endpoint::ErrorMessage { code }) => code.clone(),
            Err(body) => match ::std::str::from_utf8(body) {
              Ok(body) => body.to_string(),
              Err(err) => err.to_string(),
            },
          }
        }

        match self {
          $(
            $err::$variant(message) => {
              let status = ::hyper::http::StatusCode::$err_status;
              write!(fmt, "HTTP status {}: {}", status, format_message(message))
            },
          )*
          $err::RateLimitExceeded => fmt.write_str("rate limit exceeded"),
          $err::UnexpectedStatus(status, message) => {
            write!(fmt, "unexpected HTTP status {}: {}", status, format_message(message))
          },
          $err::Endpoint(err) => write!(fmt, "{}", err),
        }
      }
    }

    #[allow(unused_qualifications)]
    impl ::std::error::Error for $err {}

    #[allow(unused_qualifications)]
    impl ::std::convert::From<crate::endpoint::EndpointError> for $err {
      fn from(src: crate::endpoint::EndpointError) -> Self {
        $err::Endpoint(src)
      }
    }

    #[allow(unused_qualifications)]
    impl ::std::convert::From<$err> for crate::Error {
      fn from(src: $err) -> Self {
        match src {
          $(
            $err::$variant(message) => {
              let status = ::hyper::http::StatusCode::$err_status;
              let code = message.map(|m| m.code).unwrap_or_default();
              crate::Error::invalid_response(format!("HTTP status {}", status))
                .with_context(crate::context!{"error_code" => code})
            },
          )*
          $err::RateLimitExceeded => crate::Error::call_failed("rate limit exceeded"),
          $err::UnexpectedStatus(status, _) => {
            crate::Error::invalid_response(format!("unexpected HTTP status {}", status))
          },
          $err::Endpoint(err) => err.into(),
        }
      }
    }
  };
}
