use anyhow::Result;
use clap::{Parser, Subcommand};
mod input;
use codevault::{Encryptor, Storage, default_storage};
use std::io::Read;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "codevault")]
#[command(
    version,
    about = "Encrypt text and get it back later with a short random code."
)]
struct Cli {
    /// Path to the codevault records file
    #[arg(long, global = true, value_name = "PATH", env = "CODEVAULT_PATH")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encrypts text and prints the retrieval code
    Encrypt {
        /// Text to encrypt; read from stdin when omitted
        text: Option<String>,

        /// Ask for a secret of your own instead of generating one
        #[arg(long, default_value_t = false)]
        prompt_secret: bool,
    },

    /// Decrypts the text behind a code
    #[command(arg_required_else_help = true)]
    Decrypt { code: String },

    /// Lists all stored codes
    List,

    /// Deletes a code and its record
    #[command(arg_required_else_help = true)]
    Delete { code: String },
}

fn resolve_storage(path: Option<PathBuf>) -> Result<Storage> {
    match path {
        Some(p) => Ok(Storage::new(p)),
        None => default_storage(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();
    let storage = resolve_storage(args.store)?;
    match args.command {
        Commands::Encrypt {
            text,
            prompt_secret,
        } => {
            let text = match text {
                Some(t) => t,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let secret = input::read_secret(prompt_secret)?;

            let mut enc = Encryptor::open_with_storage(storage)?;
            let code = enc.encrypt(&text, secret.as_ref().map(|s| s.as_str()))?;
            println!("{code}");
        }
        Commands::Decrypt { code } => {
            let enc = Encryptor::open_with_storage(storage)?;
            match enc.decrypt(&code) {
                Some(text) => println!("{}", &*text),
                None => {
                    eprintln!("invalid code or decryption failed");
                    std::process::exit(1);
                }
            }
        }
        Commands::List => {
            let enc = Encryptor::open_with_storage(storage)?;
            for code in enc.list_codes() {
                println!("{code}");
            }
        }
        Commands::Delete { code } => {
            let mut enc = Encryptor::open_with_storage(storage)?;
            if enc.delete_code(&code)? {
                println!("code deleted");
            } else {
                eprintln!("code not found");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
