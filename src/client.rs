// SPDX-License-Identifier: GPL-3.0-or-later

use http_body_util::Full;

use hyper::body::Bytes;
use hyper::http::StatusCode;

use hyper_util::client::legacy::Client as HttpClient;
use hyper_util::rt::TokioExecutor;

#[cfg(feature = "native-tls")]
use hyper_tls::HttpsConnector;
#[cfg(all(feature = "rustls", not(feature = "native-tls")))]
use hyper_rustls::HttpsConnector;

use tracing::debug;
use tracing::info;

use url::Url;

use crate::api::API_BASE_URL;
use crate::api::API_DEMO_URL;
use crate::endpoint::collect_body;
use crate::endpoint::ConvertResult;
use crate::endpoint::Endpoint;
use crate::endpoint::EndpointError;
use crate::session::CredentialStore;


#[cfg(feature = "native-tls")]
fn https_connector() -> HttpsConnector<hyper_util::client::legacy::connect::HttpConnector> {
  HttpsConnector::new()
}

#[cfg(all(feature = "rustls", not(feature = "native-tls")))]
fn https_connector() -> HttpsConnector<hyper_util::client::legacy::connect::HttpConnector> {
  hyper_rustls::HttpsConnectorBuilder::new()
    .with_webpki_roots()
    .https_or_http()
    .enable_http1()
    .build()
}


/// A builder for creating customized [`Client`] objects.
#[derive(Debug)]
pub struct Builder {
  base_url: Url,
  credentials: CredentialStore,
}

impl Builder {
  /// Use `url` as the base URL for all requests instead of the default
  /// production endpoint.
  #[must_use]
  pub fn base_url(mut self, url: Url) -> Self {
    self.base_url = url;
    self
  }

  /// Point this client at the demo/paper-trading environment instead of
  /// production.
  #[must_use]
  pub fn demo(mut self) -> Self {
    self.base_url = Url::parse(API_DEMO_URL).unwrap();
    self
  }

  /// Seed the client with a [`CredentialStore`] instead of an empty one,
  /// e.g. one shared with a [`streaming`][crate::streaming] channel.
  #[must_use]
  pub fn credentials(mut self, credentials: CredentialStore) -> Self {
    self.credentials = credentials;
    self
  }

  /// Build the final [`Client`] object.
  pub fn build(self) -> Client {
    let http = HttpClient::builder(TokioExecutor::new()).build(https_connector());

    Client {
      base_url: self.base_url,
      credentials: self.credentials,
      http,
    }
  }
}

impl Default for Builder {
  fn default() -> Self {
    Self {
      base_url: Url::parse(API_BASE_URL).unwrap(),
      credentials: CredentialStore::new(),
    }
  }
}


/// The entity used by consumers of this crate for interacting with the
/// broker's HTTPS request/response API.
///
/// A `Client` owns a [`CredentialStore`]; the same store can be handed to
/// a [`streaming`][crate::streaming] channel so that both transports
/// observe the same credential lifecycle (see the crate-level overview).
#[derive(Debug)]
pub struct Client {
  base_url: Url,
  credentials: CredentialStore,
  http: HttpClient<HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>, Full<Bytes>>,
}

impl Client {
  /// Instantiate a [`Builder`] which allows for creating a customized
  /// `Client`.
  pub fn builder() -> Builder {
    Builder::default()
  }

  /// Create a new `Client` talking to the default production endpoint,
  /// with an empty, not-yet-logged-in [`CredentialStore`].
  pub fn new() -> Self {
    Builder::default().build()
  }

  /// The credential store backing this client's requests.
  pub fn credentials(&self) -> &CredentialStore {
    &self.credentials
  }

  /// The base URL every request is resolved against.
  pub(crate) fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Send an already-built request, without the [`Endpoint`] machinery.
  ///
  /// Used by endpoints whose response cannot be expressed purely in
  /// terms of a decoded body, e.g. the session login exchange, which
  /// carries its token material in response headers.
  pub(crate) async fn send_raw(
    &self,
    req: hyper::Request<Full<Bytes>>,
  ) -> Result<hyper::Response<hyper::body::Incoming>, crate::error::Error> {
    self.http.request(req).await.map_err(Into::into)
  }

  /// Create, issue, and decode a request to the given [`Endpoint`], via a
  /// [`RequestPipeline`].
  pub async fn issue<R>(&self, input: R::Input) -> Result<R::Output, R::Error>
  where
    R: Endpoint,
    ConvertResult<R::Output, R::Error>: From<(StatusCode, Vec<u8>)>,
  {
    RequestPipeline::<R>::new(self, input).execute().await
  }
}

impl Default for Client {
  fn default() -> Self {
    Self::new()
  }
}


/// The staged request/response pipeline behind [`Client::issue`]: building
/// the request is deferred until [`RequestPipeline::execute`] drives it
/// through `make_request` → `send` → `decode_json` in turn, mirroring the
/// endpoint's own request/parse split instead of collapsing it into one
/// monolithic call.
pub struct RequestPipeline<'a, R>
where
  R: Endpoint,
{
  client: &'a Client,
  input: R::Input,
}

impl<'a, R> RequestPipeline<'a, R>
where
  R: Endpoint,
  ConvertResult<R::Output, R::Error>: From<(StatusCode, Vec<u8>)>,
{
  pub(crate) fn new(client: &'a Client, input: R::Input) -> Self {
    Self { client, input }
  }

  /// Stage 1: resolve the endpoint's method/path/query/body against the
  /// current credentials, without touching the network.
  fn make_request(&self) -> Result<hyper::Request<Full<Bytes>>, R::Error> {
    let creds = self.client.credentials.get();
    R::request(&self.client.base_url, creds.as_ref(), &self.input).map_err(R::Error::from)
  }

  /// Stage 2: send an already-built request over the shared connection
  /// pool.
  async fn send(
    &self,
    req: hyper::Request<Full<Bytes>>,
  ) -> Result<hyper::Response<hyper::body::Incoming>, R::Error> {
    self.client.http.request(req).await.map_err(EndpointError::from).map_err(R::Error::from)
  }

  /// Stage 3: collect the response body and decode it via the endpoint's
  /// [`ConvertResult`] mapping.
  async fn decode_json(&self, res: hyper::Response<hyper::body::Incoming>) -> Result<R::Output, R::Error> {
    let status = res.status();
    let body = collect_body(res.into_body()).await.map_err(EndpointError::from).map_err(R::Error::from)?;

    debug!(%status, len = body.len(), "received HTTP response");

    let result = ConvertResult::<R::Output, R::Error>::from((status, body));
    Into::<Result<_, _>>::into(result)
  }

  /// Drive the pipeline's three stages to completion.
  pub async fn execute(self) -> Result<R::Output, R::Error> {
    let req = self.make_request()?;
    info!(method = %req.method(), uri = %req.uri(), "issuing HTTP request");
    let res = self.send(req).await?;
    self.decode_json(res).await
  }
}
