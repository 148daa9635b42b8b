//! Marketplace sites and the authorization URLs they serve.

// crates.io
use url::form_urlencoded::Serializer;
// self
use crate::_prelude::*;

macro_rules! def_sites {
	($($variant:ident => $id:literal, $domain:literal, $doc:literal;)+) => {
		/// Marketplace site a seller account belongs to.
		///
		/// The site only decides which authorization domain users are redirected to; API
		/// calls always target the shared API base.
		#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub enum MeliSite {
			$(
				#[doc = $doc]
				$variant,
			)+
		}
		impl MeliSite {
			/// Every known site, in declaration order.
			pub const ALL: &'static [MeliSite] = &[$(MeliSite::$variant),+];

			/// Returns the marketplace site identifier (e.g. `MLA`).
			pub const fn id(self) -> &'static str {
				match self {
					$(MeliSite::$variant => $id,)+
				}
			}

			/// Returns the storefront domain used for authorization (e.g. `mercadolibre.com.ar`).
			pub const fn domain(self) -> &'static str {
				match self {
					$(MeliSite::$variant => $domain,)+
				}
			}
		}
		impl FromStr for MeliSite {
			type Err = UnknownSiteError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				match s.trim().to_ascii_uppercase().as_str() {
					$($id => Ok(MeliSite::$variant),)+
					_ => Err(UnknownSiteError { value: s.to_owned() }),
				}
			}
		}
	};
}

def_sites! {
	Argentina => "MLA", "mercadolibre.com.ar", "Mercado Libre Argentina.";
	Bolivia => "MBO", "mercadolibre.com.bo", "Mercado Libre Bolivia.";
	Brazil => "MLB", "mercadolivre.com.br", "Mercado Livre Brasil.";
	Chile => "MLC", "mercadolibre.cl", "Mercado Libre Chile.";
	Colombia => "MCO", "mercadolibre.com.co", "Mercado Libre Colombia.";
	CostaRica => "MCR", "mercadolibre.co.cr", "Mercado Libre Costa Rica.";
	DominicanRepublic => "MRD", "mercadolibre.com.do", "Mercado Libre República Dominicana.";
	Ecuador => "MEC", "mercadolibre.com.ec", "Mercado Libre Ecuador.";
	ElSalvador => "MSV", "mercadolibre.com.sv", "Mercado Libre El Salvador.";
	Guatemala => "MGT", "mercadolibre.com.gt", "Mercado Libre Guatemala.";
	Honduras => "MHN", "mercadolibre.com.hn", "Mercado Libre Honduras.";
	Mexico => "MLM", "mercadolibre.com.mx", "Mercado Libre México.";
	Nicaragua => "MNI", "mercadolibre.com.ni", "Mercado Libre Nicaragua.";
	Panama => "MPA", "mercadolibre.com.pa", "Mercado Libre Panamá.";
	Paraguay => "MPY", "mercadolibre.com.py", "Mercado Libre Paraguay.";
	Peru => "MPE", "mercadolibre.com.pe", "Mercado Libre Perú.";
	Uruguay => "MLU", "mercadolibre.com.uy", "Mercado Libre Uruguay.";
	Venezuela => "MLV", "mercadolibre.com.ve", "Mercado Libre Venezuela.";
}

impl MeliSite {
	/// Builds the URL users visit to grant this application access.
	///
	/// See [`authorization_url`].
	pub fn authorization_url(self, client_id: u64, redirect_uri: &str) -> String {
		authorization_url(client_id, self, redirect_uri)
	}
}
impl Display for MeliSite {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.id())
	}
}
impl From<MeliSite> for String {
	fn from(value: MeliSite) -> Self {
		value.id().to_owned()
	}
}
impl TryFrom<String> for MeliSite {
	type Error = UnknownSiteError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

/// Error returned when a site identifier is not recognized.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown marketplace site `{value}`.")]
pub struct UnknownSiteError {
	/// Rejected input.
	pub value: String,
}

/// Builds the authorization URL for the provided client, site, and redirect URI.
///
/// The function performs no I/O and always emits the parameters in the order
/// `response_type`, `client_id`, `redirect_uri`:
/// `https://auth.<domain>/authorization?response_type=code&client_id=<id>&redirect_uri=<uri>`.
pub fn authorization_url(client_id: u64, site: MeliSite, redirect_uri: &str) -> String {
	let query = Serializer::new(String::new())
		.append_pair("response_type", "code")
		.append_pair("client_id", &client_id.to_string())
		.append_pair("redirect_uri", redirect_uri)
		.finish();

	format!("https://auth.{}/authorization?{query}", site.domain())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn authorization_url_orders_parameters_and_encodes_redirect() {
		let url = authorization_url(123456, MeliSite::Mexico, "http://someurl.com");

		assert_eq!(
			url,
			"https://auth.mercadolibre.com.mx/authorization?response_type=code&client_id=123456&redirect_uri=http%3A%2F%2Fsomeurl.com",
		);
		assert_eq!(url, MeliSite::Mexico.authorization_url(123456, "http://someurl.com"));
	}

	#[test]
	fn brazil_uses_portuguese_domain() {
		let url = authorization_url(1, MeliSite::Brazil, "https://app.example.com/cb");

		assert!(url.starts_with("https://auth.mercadolivre.com.br/authorization?"));
	}

	#[test]
	fn site_ids_parse_case_insensitively() {
		assert_eq!("mla".parse::<MeliSite>(), Ok(MeliSite::Argentina));
		assert_eq!(" MLB ".parse::<MeliSite>(), Ok(MeliSite::Brazil));
		assert!("XXX".parse::<MeliSite>().is_err());

		for site in MeliSite::ALL {
			assert_eq!(site.id().parse::<MeliSite>(), Ok(*site));
		}
	}

	#[test]
	fn serde_uses_site_identifiers() {
		let encoded =
			serde_json::to_string(&MeliSite::Peru).expect("Site should serialize successfully.");

		assert_eq!(encoded, "\"MPE\"");

		let decoded: MeliSite =
			serde_json::from_str("\"MLU\"").expect("Site should deserialize successfully.");

		assert_eq!(decoded, MeliSite::Uruguay);
		assert!(serde_json::from_str::<MeliSite>("\"nowhere\"").is_err());
	}
}
