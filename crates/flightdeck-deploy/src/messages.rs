//! Operator-facing messages written to the run's output streams.

use std::io::{self, Write};

use flightdeck_core::Configuration;

pub fn write_config_loaded(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "\nUSING PREVIOUS DEPLOYMENT CONFIG")
}

pub fn write_upgrade_in_background(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "\nUPGRADE RUNNING IN BACKGROUND\n")
}

/// Login instructions printed after a fresh deploy. Generated certificates
/// are not trusted by the client, hence `--insecure`.
pub fn write_deploy_success(config: &Configuration, out: &mut dyn Write) -> io::Result<()> {
    let insecure = if config.web_user_provided_cert {
        ""
    } else {
        " --insecure"
    };
    writeln!(out, "\nDEPLOY SUCCESSFUL. Log in with:")?;
    writeln!(
        out,
        "fly --target {} login{insecure} --concourse-url https://{} --username {} --password {}",
        config.project, config.domain, config.admin_username, config.admin_password
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "Metrics available at https://{}:3000 using the same username and password",
        config.domain
    )?;
    writeln!(out)?;
    writeln!(out, "Log into credhub with:")?;
    writeln!(
        out,
        "eval \"$(flightdeck info --env --region {} {})\"",
        config.region, config.project
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(user_cert: bool) -> Configuration {
        Configuration {
            project: "ci".to_string(),
            region: "eu-west-1".to_string(),
            domain: "ci.example.com".to_string(),
            admin_username: "admin".to_string(),
            admin_password: "pw".to_string(),
            web_user_provided_cert: user_cert,
            ..Default::default()
        }
    }

    fn render(config: &Configuration) -> String {
        let mut out = Vec::new();
        write_deploy_success(config, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn generated_cert_logs_in_insecurely() {
        let text = render(&config(false));
        assert!(text.contains(
            "fly --target ci login --insecure --concourse-url https://ci.example.com --username admin --password pw"
        ));
        assert!(text.contains("https://ci.example.com:3000"));
        assert!(text.contains("flightdeck info --env --region eu-west-1 ci"));
    }

    #[test]
    fn user_cert_logs_in_securely() {
        let text = render(&config(true));
        assert!(!text.contains("--insecure"));
        assert!(text.contains("login --concourse-url"));
    }
}
