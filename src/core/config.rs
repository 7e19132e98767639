//! Endpoint and namespace configuration.
//!
//! Nothing in the crate reads a global URL: every operation receives its
//! [`Endpoint`] from a [`ServiceConfig`], so environments and schema versions
//! can be switched at runtime.

use serde::{Deserialize, Serialize};

use super::types::Environment;

/// NF-e schema namespace used by `distDFeInt`, `envEvento` and `nfeProc`.
pub const NFE_NAMESPACE: &str = "http://www.portalfiscal.inf.br/nfe";

const DIST_WSDL: &str = "http://www.portalfiscal.inf.br/nfe/wsdl/NFeDistribuicaoDFe";
const EVENT_WSDL: &str = "http://www.portalfiscal.inf.br/nfe/wsdl/NFeRecepcaoEvento4";

/// SOAP protocol version of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoapVersion {
    /// SOAP 1.1: `text/xml` plus a `SOAPAction` header.
    Soap11,
    /// SOAP 1.2: `application/soap+xml` with the action as a media-type parameter.
    Soap12,
}

impl SoapVersion {
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            Self::Soap11 => "http://schemas.xmlsoap.org/soap/envelope/",
            Self::Soap12 => "http://www.w3.org/2003/05/soap-envelope",
        }
    }

    /// Prefix used for the envelope elements.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Soap11 => "soap",
            Self::Soap12 => "soap12",
        }
    }

    pub fn content_type(&self, action: &str) -> String {
        match self {
            Self::Soap11 => "text/xml; charset=utf-8".to_string(),
            Self::Soap12 => format!("application/soap+xml; charset=utf-8; action=\"{action}\""),
        }
    }
}

/// One web service operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Service URL.
    pub url: String,
    /// SOAP action identifier.
    pub soap_action: String,
    /// WSDL namespace of the `nfeDadosMsg` body element.
    pub namespace: String,
    pub soap_version: SoapVersion,
    /// Operation element wrapping `nfeDadosMsg` (e.g. "nfeDistDFeInteresse"), if any.
    pub operation: Option<String>,
}

impl Endpoint {
    /// Ambiente Nacional DF-e distribution service (`NFeDistribuicaoDFe`).
    pub fn distribution(environment: Environment) -> Self {
        let host = match environment {
            Environment::Production => "https://www1.nfe.fazenda.gov.br",
            Environment::Homologation => "https://hom1.nfe.fazenda.gov.br",
        };
        Self {
            url: format!("{host}/NFeDistribuicaoDFe/NFeDistribuicaoDFe.asmx"),
            soap_action: format!("{DIST_WSDL}/nfeDistDFeInteresse"),
            namespace: DIST_WSDL.to_string(),
            soap_version: SoapVersion::Soap11,
            operation: Some("nfeDistDFeInteresse".to_string()),
        }
    }

    /// Ambiente Nacional event reception service (`NFeRecepcaoEvento4`).
    pub fn events(environment: Environment) -> Self {
        let url = match environment {
            Environment::Production => {
                "https://www.nfe.fazenda.gov.br/NFeRecepcaoEvento4/NFeRecepcaoEvento4.asmx"
            }
            Environment::Homologation => {
                "https://hom1.nfe.fazenda.gov.br/NFeRecepcaoEvento4/NFeRecepcaoEvento4.asmx"
            }
        };
        Self {
            url: url.to_string(),
            soap_action: format!("{EVENT_WSDL}/nfeRecepcaoEventoNF"),
            namespace: EVENT_WSDL.to_string(),
            soap_version: SoapVersion::Soap12,
            operation: None,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Target environment (`tpAmb`).
    pub environment: Environment,
    /// Distribution endpoint.
    pub distribution: Endpoint,
    /// Event reception endpoint.
    pub events: Endpoint,
    /// Namespace of the NF-e payload schemas.
    pub nfe_namespace: String,
    /// `versao` attribute of `distDFeInt`.
    pub distribution_version: String,
    /// `versao` attribute of `envEvento` and `evento`.
    pub event_version: String,
    /// Transport timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::for_environment(Environment::Homologation)
    }
}

impl ServiceConfig {
    /// Presets for the given environment.
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            distribution: Endpoint::distribution(environment),
            events: Endpoint::events(environment),
            nfe_namespace: NFE_NAMESPACE.to_string(),
            distribution_version: "1.01".to_string(),
            event_version: "1.00".to_string(),
            timeout_secs: 30,
        }
    }

    pub fn production() -> Self {
        Self::for_environment(Environment::Production)
    }

    pub fn homologation() -> Self {
        Self::for_environment(Environment::Homologation)
    }
}

/// Builder for [`ServiceConfig`].
///
/// # Example
///
/// ```
/// use sefaz::core::{Environment, ServiceConfigBuilder};
///
/// let config = ServiceConfigBuilder::new(Environment::Production)
///     .distribution_url("https://proxy.internal/NFeDistribuicaoDFe.asmx")
///     .timeout_secs(10)
///     .build();
/// assert_eq!(config.timeout_secs, 10);
/// ```
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Start from the presets of `environment`.
    pub fn new(environment: Environment) -> Self {
        Self {
            config: ServiceConfig::for_environment(environment),
        }
    }

    pub fn distribution(mut self, endpoint: Endpoint) -> Self {
        self.config.distribution = endpoint;
        self
    }

    pub fn events(mut self, endpoint: Endpoint) -> Self {
        self.config.events = endpoint;
        self
    }

    /// Override only the distribution URL (e.g. an internal proxy).
    pub fn distribution_url(mut self, url: impl Into<String>) -> Self {
        self.config.distribution.url = url.into();
        self
    }

    /// Override only the event reception URL.
    pub fn events_url(mut self, url: impl Into<String>) -> Self {
        self.config.events.url = url.into();
        self
    }

    pub fn nfe_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.nfe_namespace = namespace.into();
        self
    }

    pub fn distribution_version(mut self, version: impl Into<String>) -> Self {
        self.config.distribution_version = version.into();
        self
    }

    pub fn event_version(mut self, version: impl Into<String>) -> Self {
        self.config.event_version = version.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn build(self) -> ServiceConfig {
        self.config
    }
}
