//! Purpose: Hold top-level CLI command dispatch for `rowpack`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` to parse/bootstrap; command execution lives here.
//! Invariants: Config resolution happens before any network or file work.
//! Invariants: Emission helpers in `main.rs` own the output envelopes.

use super::*;

pub(super) fn dispatch_command(
    command: Command,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "rowpack", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output(color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Query {
            sql,
            sql_file,
            url,
            method,
            timeout_ms,
            api_key,
            api_key_file,
            biscuit,
            biscuit_file,
            cell,
            raw,
            json,
            hex,
        } => {
            let endpoint = resolve_endpoint(url)?;
            let api_key = resolve_api_key(api_key, api_key_file)?;
            let biscuits = collect_biscuits(biscuit, biscuit_file)?;
            let method = parse_method(&method)?;
            let sql = resolve_sql(sql, sql_file)?;

            let config = QueryConfig::new(endpoint, api_key)?
                .with_method(method)
                .with_timeout(Duration::from_millis(timeout_ms))
                .with_biscuits(biscuits);
            let client = QueryClient::new(config);

            if raw {
                let body = client.execute_raw(&sql)?;
                emit_raw_body(&body, color_mode);
                return Ok(RunOutcome::ok());
            }

            let response = client.execute(&sql)?;
            let result = response.into_result_set()?;
            emit_result(&result, cell.as_deref(), json, hex, color_mode)
        }
        Command::Flatten {
            file,
            cell,
            json,
            hex,
        } => {
            let source = file.as_deref().unwrap_or("-");
            let text = read_text_source(source, "failed to read response document")?;
            let value: Value = serde_json::from_str(&text).map_err(|err| {
                Error::new(ErrorKind::Invalid)
                    .with_message("invalid response")
                    .with_hint("The input is not valid JSON.")
                    .with_source(err)
            })?;
            let response = QueryResponse::from_json_value(value)?;
            let result = response.into_result_set()?;
            emit_result(&result, cell.as_deref(), json, hex, color_mode)
        }
    }
}
