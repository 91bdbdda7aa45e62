pub mod fred;
pub mod yahoo_finance;
pub mod yahoo_summary;

const USER_AGENT: &str = "ivx/0.2";

pub(crate) fn http_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}

/// Yahoo rejects raw `^` in index symbols, so encode it up front.
pub(crate) fn encode_symbol(symbol: &str) -> String {
    symbol.replace('^', "%5E")
}
