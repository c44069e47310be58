use certsign::authority::{AuthorityPolicy, CertificateAuthority};
use certsign::cert::params::{DistinguishedName, Identity};
use certsign::csr;
use certsign::key::{KeyAlgorithm, KeyPair};
use certsign::loader::CaPaths;

fn main() -> Result<(), certsign::error::PkiError> {
    // Use the CA named by CA_CERT / CA_KEY when both are set, otherwise make a fresh one.
    let ca = match CaPaths::from_env() {
        Ok(paths) => paths.load(AuthorityPolicy::default())?,
        Err(_) => CertificateAuthority::generate(
            &Identity::from_common_name("SELF-CA"),
            KeyAlgorithm::EcdsaP256,
            AuthorityPolicy::default(),
        )?,
    };
    println!("CA Certificate PEM:\n{}", ca.certificate_pem()?);

    let service = Identity::builder()
        .subject(
            DistinguishedName::builder()
                .common_name("svc.example.com".to_string())
                .organization("Example Corp".to_string())
                .country("US".to_string())
                .build(),
        )
        .dns_names(vec!["svc.example.com".to_string()])
        .email_addresses(vec!["ops@example.com".to_string()])
        .build();

    let key = KeyPair::generate_ecdsa_p256();
    let request = csr::build_request(&key, &service)?;
    let issued = ca.issue_from_csr(&request)?;
    println!("Server Certificate PEM:\n{}", issued.certificate_pem);
    println!("Server Private Key PEM:\n{}", key.to_pem()?);

    let direct = ca.issue_server_certificate(
        &Identity::builder()
            .subject(DistinguishedName::from_common_name("api.example.com"))
            .dns_names(vec![
                "api.example.com".to_string(),
                "api.internal".to_string(),
            ])
            .build(),
        KeyAlgorithm::Rsa { bits: 2048 },
    )?;
    println!("Direct Certificate PEM:\n{}", direct.certificate_pem);

    Ok(())
}
