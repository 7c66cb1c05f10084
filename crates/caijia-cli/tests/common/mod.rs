#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[allow(dead_code)]
pub const CMD_TIMEOUT: Duration = Duration::from_secs(15);

#[allow(dead_code)]
pub const INDEX_HTML: &str = r#"<html><body><ul>
<li><a href="/fgw/jbsj/20250101/100.html">1月1日主要农副产品价格</a></li>
<li><a href="/fgw/jbsj/20250516/89097.html">5月16日主要农副产品价格</a></li>
<li><a href="/fgw/jbsj/20250516/89098.html">工作动态</a></li>
</ul></body></html>"#;

#[allow(dead_code)]
pub const BULLETIN_HTML: &str = r"<html><body><table>
<tr><td>序号</td><td>品名</td><td>单位</td><td>最高价</td><td>最低价</td><td>均价</td></tr>
<tr><td>1</td><td>西红柿</td><td>元/斤</td><td>6</td><td>2</td><td>4</td></tr>
<tr><td>2</td><td>番茄</td><td>元/斤</td><td>5</td><td>3</td><td>4</td></tr>
<tr><td>3</td><td>青菜</td><td>元/斤</td><td>3</td><td>2</td><td>2.5</td></tr>
</table></body></html>";

/// An empty config file: every setting at its default.
fn config_file() -> PathBuf {
    static CONFIG_DIR: OnceLock<TempDir> = OnceLock::new();
    let dir = CONFIG_DIR.get_or_init(|| {
        let dir = tempfile::tempdir().expect("failed to create config dir for tests");
        std::fs::write(dir.path().join("config.toml"), "").expect("failed to write config");
        dir
    });
    dir.path().join("config.toml")
}

/// Create a `caijia` command isolated from the user's config and API keys.
#[allow(dead_code)]
pub fn caijia_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("caijia"));
    cmd.timeout(CMD_TIMEOUT);
    cmd.env("CAIJIA_CONFIG", config_file());
    cmd.env_remove("OPENAI_API_KEY");
    cmd.env_remove("CAIJIA_INDEX_URL");
    cmd.env_remove("RUST_LOG");
    cmd.env("NO_COLOR", "1");
    cmd
}

/// `caijia_cmd` pointed at the index page of `server`.
#[allow(dead_code)]
pub fn caijia_cmd_for(server: &MockServer) -> Command {
    let mut cmd = caijia_cmd();
    cmd.env("CAIJIA_INDEX_URL", format!("{}/fgw/jbsj/index.html", server.uri()));
    cmd
}

/// Serve an index page and the bulletin it links to.
#[allow(dead_code)]
pub async fn serve_bulletin(index: &str, bulletin: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fgw/jbsj/index.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fgw/jbsj/20250516/89097.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(bulletin))
        .mount(&server)
        .await;
    server
}
