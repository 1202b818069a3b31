use serde::de::DeserializeOwned;

use crate::{
    aflerr,
    allocation::AllocationPlan,
    core_types::{to_afl, AflResult},
};

pub const DEFAULT_API_BASE: &str = "http://localhost:3000";
pub const API_URL_ENV: &str = "ASSETFLOW_API_URL";
pub const SESSION_COOKIE: &str = "assetflow_session";

/// Backend routes, all relative to the api base.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    Index { force: bool },
    History,
    Calendar,
    Alerts,
    Correlation,
    News(String),
    DividendHistory,
    Simulation,
    AddAsset,
    UpdateAsset,
    DeleteAsset,
    Login,
    Logout,
}
impl Endpoint {
    pub fn path(&self) -> String {
        match self {
            Endpoint::Index { force: true } => "/api/index?force=true".to_string(),
            Endpoint::Index { force: false } => "/api/index".to_string(),
            Endpoint::History => "/api/history".to_string(),
            Endpoint::Calendar => "/api/calendar".to_string(),
            Endpoint::Alerts => "/api/alerts".to_string(),
            Endpoint::Correlation => "/api/correlation".to_string(),
            Endpoint::News(ticker) => format!("/api/news/{}", urlencoding::encode(ticker.trim())),
            Endpoint::DividendHistory => "/api/dividends/history".to_string(),
            Endpoint::Simulation => "/api/simulation".to_string(),
            Endpoint::AddAsset => "/api/add_asset".to_string(),
            Endpoint::UpdateAsset => "/api/update_asset".to_string(),
            Endpoint::DeleteAsset => "/api/delete_asset".to_string(),
            Endpoint::Login => "/api/auth/login".to_string(),
            Endpoint::Logout => "/api/auth/logout".to_string(),
        }
    }
    pub fn url(&self, base: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), self.path())
    }
}

/// The web build talks to its own origin, the native build to the gateway.
pub fn default_api_base() -> String {
    #[cfg(target_arch = "wasm32")]
    {
        String::new()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        std::env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_BASE.to_string())
    }
}

/// Extracts `assetflow_session=...` from a `Set-Cookie` header value.
pub fn session_from_set_cookie(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find(|kv| {
            kv.split_once('=')
                .map(|(k, v)| k == SESSION_COOKIE && !v.is_empty())
                .unwrap_or(false)
        })
        .map(|kv| kv.to_string())
}

pub fn decode_json<T: DeserializeOwned>(resp: &ehttp::Response) -> AflResult<T> {
    let text = resp.text().unwrap_or("");
    if !resp.ok {
        let snippet = text.chars().take(80).collect::<String>();
        return Err(aflerr!(
            "status {} {} {}",
            resp.status,
            resp.status_text,
            snippet
        ));
    }
    if text.trim().is_empty() {
        return Err(aflerr!("empty response from {}", resp.url));
    }
    serde_json::from_str(text).map_err(to_afl)
}

pub fn plan_to_csv(plan: &AllocationPlan) -> AflResult<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer
        .write_record([
            "ticker",
            "tipo",
            "acao",
            "quantidade",
            "preco",
            "custo",
            "impacto_meta",
            "racional",
        ])
        .map_err(to_afl)?;
    for p in &plan.purchases {
        writer
            .write_record([
                p.ticker.clone(),
                p.tipo.clone(),
                p.kind.to_string(),
                p.quantity.to_string(),
                format!("{:.2}", p.unit_price),
                format!("{:.2}", p.cost),
                p.gap_impact_pct
                    .map(|x| format!("{x:.1}"))
                    .unwrap_or_default(),
                p.rationale.join("; "),
            ])
            .map_err(to_afl)?;
    }
    writer
        .write_record([
            "TOTAL",
            "",
            "",
            "",
            "",
            &format!("{:.2}", plan.total_allocated()),
            "",
            &format!("sobra {:.2}", plan.leftover()),
        ])
        .map_err(to_afl)?;
    let bytes = writer.into_inner().map_err(to_afl)?;
    String::from_utf8(bytes).map_err(to_afl)
}

#[cfg(target_arch = "wasm32")]
fn download_str(s: &str, filename: &str) -> Result<(), wasm_bindgen::JsValue> {
    use wasm_bindgen::JsCast;
    use web_sys::{Blob, HtmlElement, Url};

    let blob = Blob::new_with_str_sequence(&serde_wasm_bindgen::to_value(&[s])?)?;
    let url = Url::create_object_url_with_blob(&blob)?;

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| wasm_bindgen::JsValue::from_str("no document"))?;
    let download_link = document.create_element("a")?.dyn_into::<HtmlElement>()?;
    download_link.set_attribute("href", &url)?;
    download_link.set_attribute("download", filename)?;
    download_link.click();
    Url::revoke_object_url(&url)?;
    Ok(())
}

/// Downloads the csv in the browser or writes it to the working directory.
pub fn export_plan(plan: &AllocationPlan, filename: &str) -> AflResult<String> {
    let s = plan_to_csv(plan)?;
    #[cfg(target_arch = "wasm32")]
    download_str(&s, filename).map_err(to_afl)?;
    #[cfg(not(target_arch = "wasm32"))]
    std::fs::write(filename, s).map_err(to_afl)?;
    tracing::info!(filename, purchases = plan.purchases.len(), "exported plan");
    Ok(filename.to_string())
}

#[cfg(test)]
fn response(status: u16, body: &str) -> ehttp::Response {
    ehttp::Response {
        url: "http://localhost:3000/api/index".to_string(),
        ok: (200..300).contains(&status),
        status,
        status_text: "".to_string(),
        headers: ehttp::Headers::default(),
        bytes: body.as_bytes().to_vec(),
    }
}

#[test]
fn test_endpoint_urls() {
    assert_eq!(
        Endpoint::Index { force: true }.url("http://localhost:3000/"),
        "http://localhost:3000/api/index?force=true"
    );
    assert_eq!(Endpoint::Calendar.url(""), "/api/calendar");
    assert_eq!(
        Endpoint::News("TESOURO SELIC".to_string()).path(),
        "/api/news/TESOURO%20SELIC"
    );
    assert_eq!(Endpoint::Login.path(), "/api/auth/login");
    assert_eq!(Endpoint::Logout.path(), "/api/auth/logout");
}

#[test]
fn test_session_cookie() {
    assert_eq!(
        session_from_set_cookie("assetflow_session=authenticated; HttpOnly; Path=/; Max-Age=604800"),
        Some("assetflow_session=authenticated".to_string())
    );
    assert_eq!(session_from_set_cookie("other=1; Path=/"), None);
    assert_eq!(session_from_set_cookie("assetflow_session=; Path=/"), None);
}

#[test]
fn test_decode_json() {
    #[derive(serde::Deserialize, Debug)]
    struct Reply {
        status: String,
    }
    let r: Reply = decode_json(&response(200, r#"{"status":"Sucesso"}"#)).unwrap();
    assert_eq!(r.status, "Sucesso");
    let e = decode_json::<Reply>(&response(401, r#"{"error":"Unauthorized"}"#)).unwrap_err();
    assert!(e.msg.contains("401"));
    assert!(decode_json::<Reply>(&response(200, "")).is_err());
    assert!(decode_json::<Reply>(&response(200, "<html>")).is_err());
}

#[test]
fn test_plan_to_csv() {
    use crate::model::Asset;
    let assets = vec![Asset {
        id: 1,
        ticker: "ITSA4".to_string(),
        tipo: "Ação".to_string(),
        preco_atual: 10.0,
        falta_comprar: 100.0,
        ..Default::default()
    }];
    let plan = crate::allocation::simulate(1000.0, &assets).unwrap();
    let csv = plan_to_csv(&plan).unwrap();
    let lines = csv.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("ticker,tipo,acao"));
    assert!(lines[1].starts_with("ITSA4,Ação,Rebalanceamento,10,10.00,100.00,100.0,"));
    assert!(lines[2].starts_with("TOTAL,"));
    assert!(lines[2].ends_with("sobra 900.00"));
}
