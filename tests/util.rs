use certsign::authority::{AuthorityPolicy, CertificateAuthority};
use certsign::cert::params::{DistinguishedName, Identity};
use certsign::key::KeyAlgorithm;

pub fn generate_ca(algorithm: KeyAlgorithm) -> CertificateAuthority {
    let identity = Identity::builder()
        .subject(
            DistinguishedName::builder()
                .common_name("SELF-CA".to_string())
                .organization("Example Corp".to_string())
                .country("US".to_string())
                .build(),
        )
        .build();

    CertificateAuthority::generate(&identity, algorithm, AuthorityPolicy::default()).unwrap()
}

pub fn service_identity(dns_name: &str) -> Identity {
    Identity::builder()
        .subject(
            DistinguishedName::builder()
                .common_name(dns_name.to_string())
                .organization("Example Corp".to_string())
                .organization_unit("Platform".to_string())
                .locality("Springfield".to_string())
                .build(),
        )
        .dns_names(vec![dns_name.to_string()])
        .build()
}
