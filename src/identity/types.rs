use crate::identity::wire;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Numeric identifier of an authenticated principal
pub type IdentityId = u64;

/// Opaque server-issued session token ("hash").
///
/// `Debug` and `Display` never print the token itself.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token; blank tokens are rejected.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = wire::lenient_string(deserializer)?;
        Credential::new(raw).ok_or_else(|| serde::de::Error::custom("empty credential"))
    }
}

/// Membership role of a principal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    /// Primary (paying) member
    #[default]
    Member,
    /// Dependent attached to a primary member
    Dependent,
    /// Person referred by a partner
    PartnerReferred,
}

impl Role {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Role::Member => "titular",
            Role::Dependent => "dependente",
            Role::PartnerReferred => "parceiro",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "titular" | "associado" | "member" => Ok(Role::Member),
            "dependente" | "dependent" => Ok(Role::Dependent),
            "parceiro" | "indicado" | "partner" => Ok(Role::PartnerReferred),
            other => Err(format!("unknown role: {:?}", other)),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = wire::lenient_string(deserializer)?;
        if raw.trim().is_empty() {
            return Ok(Role::default());
        }
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Postal address attached to a profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "rua", default, deserialize_with = "wire::lenient_string")]
    pub street: String,
    #[serde(rename = "numero", default, deserialize_with = "wire::lenient_string")]
    pub number: String,
    #[serde(rename = "complemento", default, deserialize_with = "wire::lenient_string")]
    pub complement: String,
    #[serde(rename = "bairro", default, deserialize_with = "wire::lenient_string")]
    pub district: String,
    #[serde(rename = "cidade", default, deserialize_with = "wire::lenient_string")]
    pub city: String,
    #[serde(rename = "uf", default, deserialize_with = "wire::lenient_string")]
    pub state: String,
    #[serde(rename = "cep", default, deserialize_with = "wire::lenient_string")]
    pub postal_code: String,
}

/// The authenticated principal.
///
/// Serialized field names follow the backend's payload so the same type reads
/// the login response and the persisted copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(deserialize_with = "wire::flexible_u64")]
    pub id: IdentityId,
    #[serde(rename = "nome", default, deserialize_with = "wire::lenient_string")]
    pub name: String,
    #[serde(rename = "cpf", default, deserialize_with = "wire::lenient_string")]
    pub document: String,
    #[serde(rename = "telefone", default, deserialize_with = "wire::lenient_string")]
    pub phone: String,
    #[serde(rename = "registro", default, deserialize_with = "wire::lenient_string")]
    pub registration: String,
    #[serde(rename = "validade", default, deserialize_with = "wire::lenient_string")]
    pub valid_until: String,
    #[serde(rename = "foto", default, deserialize_with = "wire::optional_string")]
    pub photo: Option<String>,
    #[serde(rename = "tipo", default)]
    pub role: Role,
    #[serde(rename = "endereco", default, deserialize_with = "wire::optional_record")]
    pub address: Option<Address>,
    #[serde(rename = "nascimento", default, deserialize_with = "wire::lenient_string")]
    pub birth_date: String,
    #[serde(rename = "validado", default, deserialize_with = "wire::flexible_bool")]
    pub validated: bool,
    #[serde(rename = "primeiro_acesso", default, deserialize_with = "wire::flexible_bool")]
    pub first_access: bool,
    #[serde(
        rename = "hash",
        default,
        deserialize_with = "optional_credential",
        skip_serializing_if = "Option::is_none"
    )]
    pub credential: Option<Credential>,
}

fn optional_credential<'de, D>(deserializer: D) -> Result<Option<Credential>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(wire::optional_string(deserializer)?.and_then(Credential::new))
}

impl Identity {
    /// Minimal identity; remaining fields take their empty defaults.
    pub fn new(id: IdentityId, name: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            document: document.into(),
            phone: String::new(),
            registration: String::new(),
            valid_until: String::new(),
            photo: None,
            role: Role::default(),
            address: None,
            birth_date: String::new(),
            validated: false,
            first_access: false,
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Copy with only the photo reference replaced.
    pub fn with_photo(&self, photo: Option<String>) -> Self {
        Self {
            photo: photo.filter(|p| !p.trim().is_empty()),
            ..self.clone()
        }
    }

    /// Copy without the credential, as written to the identity store key.
    pub fn without_credential(&self) -> Self {
        Self {
            credential: None,
            ..self.clone()
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}
