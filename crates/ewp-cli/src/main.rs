//! Command-line interface for PayPal Encrypted Website Payments.
//!
//! Signs and encrypts button form data with PEM keys and certificates, and
//! opens the resulting PKCS#7 structures again for inspection.

use clap::{Parser, Subcommand};
use ewp::crypto::{load_certificate, load_private_key, load_private_key_with_passphrase};
use ewp::{
    ContentCipher, DigestAlgorithm, EncryptedMessage, Ewp, OutputFormat, PrivateKey,
    SignedMessage,
};
use log::info;
use secrecy::SecretString;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ewp")]
#[command(about = "PKCS#7 signing and encryption for PayPal Encrypted Website Payments")]
#[command(long_about = "
PKCS#7 signing and encryption for PayPal Encrypted Website Payments

EXAMPLES:
    # Build the encrypted blob for a button
    ewp seal -k merchant.key -c merchant.crt -r paypal.crt -f pem -i button.txt

    # Detached signature only
    ewp sign -k merchant.key -c merchant.crt -i button.txt -o button.p7s

    # Check a detached signature
    ewp verify -c merchant.crt --content button.txt -i button.p7s

ENVIRONMENT VARIABLES:
    EWP_KEY_PASSWORD    Passphrase for an encrypted private key
    RUST_LOG            Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Input file (defaults to stdin)
    #[arg(short, long, global = true, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long, global = true, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Show progress messages
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign data with the merchant key and certificate
    Sign {
        #[command(flatten)]
        signer: SignerArgs,

        /// Embed the content instead of producing a detached signature
        #[arg(long)]
        embed: bool,

        /// Output encoding: der or pem
        #[arg(short, long, default_value_t = OutputFormat::Der)]
        format: OutputFormat,
    },

    /// Encrypt data for a recipient certificate
    Encrypt {
        /// Recipient certificate (PEM)
        #[arg(short, long, value_name = "CERT")]
        recipient: PathBuf,

        /// Content cipher
        #[arg(long, default_value_t = ContentCipher::Aes256Cbc)]
        cipher: ContentCipher,

        /// Output encoding: der or pem
        #[arg(short, long, default_value_t = OutputFormat::Der)]
        format: OutputFormat,
    },

    /// Sign with embedded content, then encrypt for the recipient
    Seal {
        #[command(flatten)]
        signer: SignerArgs,

        /// Recipient certificate (PEM)
        #[arg(short, long, value_name = "CERT")]
        recipient: PathBuf,

        /// Content cipher
        #[arg(long, default_value_t = ContentCipher::Aes256Cbc)]
        cipher: ContentCipher,

        /// Output encoding: der or pem
        #[arg(short, long, default_value_t = OutputFormat::Pem)]
        format: OutputFormat,
    },

    /// Verify a signature and print the signed content
    Verify {
        /// Signer certificate (PEM)
        #[arg(short = 'c', long = "cert", value_name = "CERT")]
        certificate: PathBuf,

        /// Content of a detached signature
        #[arg(long, value_name = "FILE")]
        content: Option<PathBuf>,
    },

    /// Decrypt an envelope addressed to the given key and certificate
    Decrypt {
        /// Private key (PEM)
        #[arg(short = 'k', long = "key", value_name = "KEY")]
        private_key: PathBuf,

        /// Certificate of the key (PEM)
        #[arg(short = 'c', long = "cert", value_name = "CERT")]
        certificate: PathBuf,

        /// Passphrase for an encrypted private key
        #[arg(long, env = "EWP_KEY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

#[derive(clap::Args)]
struct SignerArgs {
    /// Merchant private key (PEM)
    #[arg(short = 'k', long = "key", value_name = "KEY")]
    private_key: PathBuf,

    /// Merchant certificate (PEM)
    #[arg(short = 'c', long = "cert", value_name = "CERT")]
    certificate: PathBuf,

    /// Passphrase for an encrypted private key
    #[arg(long, env = "EWP_KEY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Message digest
    #[arg(short, long, default_value_t = DigestAlgorithm::Sha256)]
    digest: DigestAlgorithm,
}

impl SignerArgs {
    fn builder(&self) -> Ewp {
        let ewp = Ewp::new()
            .private_key(&self.private_key)
            .certificate(&self.certificate)
            .digest(self.digest);

        match self.password {
            Some(ref password) => ewp.password(password.as_str()),
            None => ewp,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let input = read_input(cli.input.as_deref())?;
    let output = run(cli.command, &input)?;
    write_output(cli.output.as_deref(), &output)?;

    Ok(())
}

fn run(command: Commands, input: &[u8]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let output = match command {
        Commands::Sign {
            signer,
            embed,
            format,
        } => {
            let signed = signer.builder().detached(!embed).sign(input)?;
            info!("Signed {} bytes", input.len());
            signed.encode(format)?
        }
        Commands::Encrypt {
            recipient,
            cipher,
            format,
        } => {
            let encrypted = Ewp::new()
                .recipient_certificate(recipient)
                .cipher(cipher)
                .encrypt(input)?;
            info!("Encrypted {} bytes", input.len());
            encrypted.encode(format)?
        }
        Commands::Seal {
            signer,
            recipient,
            cipher,
            format,
        } => signer
            .builder()
            .recipient_certificate(recipient)
            .cipher(cipher)
            .seal(input)?
            .encode(format)?,
        Commands::Verify {
            certificate,
            content,
        } => {
            let cert = load_certificate(&certificate)?;
            let signed = if is_pem(input) {
                SignedMessage::from_pem(input)?
            } else {
                SignedMessage::from_der(input)?
            };

            let content = content.map(fs::read).transpose()?;
            let verified = signed.verify(content.as_deref(), &cert)?;
            info!("Signature verified against {}", cert.subject());
            verified
        }
        Commands::Decrypt {
            private_key,
            certificate,
            password,
        } => {
            let key = load_key(&private_key, password)?;
            let cert = load_certificate(&certificate)?;
            let encrypted = if is_pem(input) {
                EncryptedMessage::from_pem(input)?
            } else {
                EncryptedMessage::from_der(input)?
            };
            encrypted.decrypt(&key, &cert)?
        }
    };

    Ok(output)
}

fn load_key(path: &Path, password: Option<String>) -> ewp::Result<PrivateKey> {
    match password {
        Some(password) => load_private_key_with_passphrase(path, &SecretString::new(password)),
        None => load_private_key(path),
    }
}

fn is_pem(data: &[u8]) -> bool {
    data.iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(false, |start| data[start..].starts_with(b"-----BEGIN"))
}

fn read_input(path: Option<&Path>) -> io::Result<Vec<u8>> {
    match path {
        Some(path) => fs::read(path),
        None => {
            let mut data = Vec::new();
            io::stdin().lock().read_to_end(&mut data)?;
            Ok(data)
        }
    }
}

fn write_output(path: Option<&Path>, data: &[u8]) -> io::Result<()> {
    match path {
        Some(path) => fs::write(path, data),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()
        }
    }
}
