use serde::{Deserialize, Serialize};

use crate::core::{DocumentKey, Environment, NFE_NAMESPACE, Nsu, SefazError, ServiceConfig, TaxpayerId};
use crate::xml::Element;

/// What a distribution request asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    /// `consChNFe/chNFe`: one document by key.
    Key(DocumentKey),
    /// `distNSU/ultNSU`: everything after the given cursor.
    AfterNsu(Nsu),
    /// `consNSU/NSU`: exactly one NSU.
    ExactNsu(Nsu),
}

/// A `distDFeInt` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionQuery {
    pub interested: TaxpayerId,
    pub environment: Environment,
    /// `cUFAutor`: IBGE code of the interested party's state.
    pub region_code: u8,
    pub selector: Selector,
}

impl DistributionQuery {
    /// Query one document; the region comes from the key.
    pub fn by_key(interested: TaxpayerId, environment: Environment, key: DocumentKey) -> Self {
        Self {
            interested,
            environment,
            region_code: key.region_code(),
            selector: Selector::Key(key),
        }
    }

    /// Resume the backlog after `last`.
    pub fn after_nsu(
        interested: TaxpayerId,
        environment: Environment,
        region_code: u8,
        last: Nsu,
    ) -> Self {
        Self {
            interested,
            environment,
            region_code,
            selector: Selector::AfterNsu(last),
        }
    }

    /// Fetch exactly one NSU.
    pub fn exact_nsu(
        interested: TaxpayerId,
        environment: Environment,
        region_code: u8,
        nsu: Nsu,
    ) -> Self {
        Self {
            interested,
            environment,
            region_code,
            selector: Selector::ExactNsu(nsu),
        }
    }

    /// `distDFeInt` under the NF-e namespace, version `1.01`.
    pub fn to_element(&self) -> Result<Element, SefazError> {
        self.element_with(NFE_NAMESPACE, "1.01")
    }

    /// `distDFeInt` using the namespace and version from `config`.
    pub fn to_element_for(&self, config: &ServiceConfig) -> Result<Element, SefazError> {
        self.element_with(&config.nfe_namespace, &config.distribution_version)
    }

    fn element_with(&self, namespace: &str, version: &str) -> Result<Element, SefazError> {
        if !(11..=99).contains(&self.region_code) {
            return Err(SefazError::Validation(format!(
                "cUFAutor must be a two-digit IBGE code, got {}",
                self.region_code
            )));
        }
        let selector = match &self.selector {
            Selector::Key(key) => Element::new("consChNFe").text_child("chNFe", key.as_str()),
            Selector::AfterNsu(nsu) => Element::new("distNSU").text_child("ultNSU", nsu.to_string()),
            Selector::ExactNsu(nsu) => Element::new("consNSU").text_child("NSU", nsu.to_string()),
        };
        Ok(Element::new("distDFeInt")
            .attr("versao", version)
            .attr("xmlns", namespace)
            .text_child("tpAmb", self.environment.code().to_string())
            .text_child("cUFAutor", self.region_code.to_string())
            .text_child(self.interested.tag(), self.interested.digits())
            .child(selector))
    }

    /// Serialized `distDFeInt`, without XML declaration.
    pub fn payload(&self, config: &ServiceConfig) -> Result<Vec<u8>, SefazError> {
        Ok(self.to_element_for(config)?.to_xml()?.into_bytes())
    }
}
