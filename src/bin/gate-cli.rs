use clap::{Parser, Subcommand};
use cookie::Cookie;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Operator CLI for the request gate", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Token issuance path.
    #[arg(long, default_value = "/api/csrf-token")]
    issue_path: String,

    /// Header carrying the submitted token.
    #[arg(long, default_value = "x-csrf-token")]
    header: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a fresh token and print it with its cookie
    Token,
    /// Bootstrap a token, then send one request through the gate with it
    Probe {
        #[arg(short, long, default_value = "POST")]
        method: Method,

        #[arg(short, long)]
        path: String,

        /// Submit a token that differs from the cookie in one character
        #[arg(long)]
        tamper: bool,

        /// Request body
        #[arg(long)]
        body: Option<String>,
    },
}

struct Issued {
    token: String,
    cookie: Cookie<'static>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Token => {
            let issued = issue(&client, &cli.url, &cli.issue_path).await?;
            println!("token:  {}", issued.token);
            println!("cookie: {}", issued.cookie);
        }
        Commands::Probe {
            method,
            path,
            tamper,
            body,
        } => {
            let issued = issue(&client, &cli.url, &cli.issue_path).await?;
            let submitted = if tamper {
                tampered(&issued.token)
            } else {
                issued.token.clone()
            };

            let mut headers = HeaderMap::new();
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&format!("{}={}", issued.cookie.name(), issued.cookie.value()))?,
            );
            headers.insert(
                reqwest::header::HeaderName::from_bytes(cli.header.as_bytes())?,
                HeaderValue::from_str(&submitted)?,
            );

            let res = client
                .request(method, format!("{}{}", cli.url, path))
                .headers(headers)
                .body(body.unwrap_or_default())
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn issue(
    client: &reqwest::Client,
    url: &str,
    issue_path: &str,
) -> Result<Issued, Box<dyn std::error::Error>> {
    let res = client.get(format!("{}{}", url, issue_path)).send().await?;
    if !res.status().is_success() {
        return Err(format!("issuance endpoint returned {}", res.status()).into());
    }

    let cookie = res
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| Cookie::parse(v.to_owned()).ok())
        .ok_or("issuance response carried no cookie")?;

    let json: Value = res.json().await?;
    let token = json["token"]
        .as_str()
        .ok_or("issuance response carried no token")?
        .to_owned();

    Ok(Issued { token, cookie })
}

fn tampered(token: &str) -> String {
    let mut chars: Vec<char> = token.chars().collect();
    if let Some(last) = chars.last_mut() {
        *last = if *last == '0' { '1' } else { '0' };
    }
    chars.into_iter().collect()
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    println!("status: {}", status);
    for name in ["retry-after", "x-ratelimit-limit", "x-ratelimit-remaining"] {
        if let Some(value) = res.headers().get(name) {
            println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
        }
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
