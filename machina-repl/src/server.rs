//! The REPL server: a Unix domain socket advertised via a dir file,
//! serving newline-delimited JSON requests against a fixed set of named
//! actors.

use crate::error::ReplError;
use crate::wire::{Opcode, Request, Response};
use machina_actor::ActorHandle;
use machina_core::{DurationMs, Mutation, MutationKind, MutationWire};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};

/// A JSON-over-Unix-socket REPL server multiplexing requests across a
/// fixed set of named actors.
pub struct Server {
    listener: UnixListener,
    socket_path: PathBuf,
    dir_file: PathBuf,
    actors: Arc<HashMap<String, ActorHandle>>,
}

impl Server {
    /// Bind a REPL socket for `machine_id` under `runtime_dir`, advertising
    /// its path via a sibling dir file (`runtime_dir/machina-{machine_id}.dir`,
    /// containing the socket path) so another process can discover it
    /// without a separate registry.
    pub async fn bind(
        runtime_dir: impl AsRef<Path>,
        machine_id: &str,
        actors: HashMap<String, ActorHandle>,
    ) -> Result<Self, ReplError> {
        let runtime_dir = runtime_dir.as_ref();
        let socket_path = runtime_dir.join(format!("machina-{machine_id}.sock"));
        let dir_file = runtime_dir.join(format!("machina-{machine_id}.dir"));

        // A stale socket file from a previous run would otherwise make bind fail.
        let _ = std::fs::remove_file(&socket_path);

        let listener = UnixListener::bind(&socket_path).map_err(|source| ReplError::Bind {
            path: socket_path.display().to_string(),
            source,
        })?;
        tokio::fs::write(&dir_file, socket_path.display().to_string())
            .await
            .map_err(|source| ReplError::DirFile {
                path: dir_file.display().to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            socket_path,
            dir_file,
            actors: Arc::new(actors),
        })
    }

    /// The path this server's socket is listening on.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// The dir file advertising this server's socket path.
    pub fn dir_file(&self) -> &Path {
        &self.dir_file
    }

    /// Accept connections until an I/O error tears down the listener.
    /// Each connection is served on its own task; this never returns on
    /// the happy path.
    pub async fn serve(self) -> Result<(), ReplError> {
        loop {
            let (stream, _addr) = self.listener.accept().await.map_err(ReplError::Accept)?;
            let actors = self.actors.clone();
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, actors).await {
                    tracing::debug!(%err, "repl connection ended");
                }
            });
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
        let _ = std::fs::remove_file(&self.dir_file);
    }
}

fn mutation_from_wire(wire: MutationWire) -> Mutation {
    let mut mutation = match wire.kind {
        MutationKind::Add => Mutation::add(wire.targets),
        MutationKind::Remove => Mutation::remove(wire.targets),
        MutationKind::Set => Mutation::set(wire.targets),
    };
    mutation.args = wire.args.into_arg_bag();
    mutation.deadline = wire.deadline_ms.map(DurationMs::from_millis);
    mutation
}

async fn handle_connection(
    stream: UnixStream,
    actors: Arc<HashMap<String, ActorHandle>>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(&mut writer, &Response::error(err.to_string())).await?;
                continue;
            }
        };
        let Some(opcode) = Opcode::from_code(request.opcode) else {
            write_response(
                &mut writer,
                &Response::error(format!("unknown opcode {}", request.opcode)),
            )
            .await?;
            continue;
        };
        let Some(actor) = actors.get(&request.actor) else {
            write_response(
                &mut writer,
                &Response::error(format!("unknown actor {:?}", request.actor)),
            )
            .await?;
            continue;
        };

        match opcode {
            Opcode::InspectSchema => {
                let names = actor.schema_names().await;
                write_response(
                    &mut writer,
                    &Response {
                        ok: true,
                        schema_names: Some(names),
                        ..Default::default()
                    },
                )
                .await?;
            }
            Opcode::ListActive => {
                let active: Vec<String> = actor.active_set().await.into_iter().collect();
                write_response(
                    &mut writer,
                    &Response {
                        ok: true,
                        active: Some(active),
                        ..Default::default()
                    },
                )
                .await?;
            }
            Opcode::PushMutation => {
                let Some(wire) = request.mutation else {
                    write_response(
                        &mut writer,
                        &Response::error("PushMutation requires a mutation body"),
                    )
                    .await?;
                    continue;
                };
                let (result, _transition) = actor.submit(mutation_from_wire(wire)).await;
                write_response(
                    &mut writer,
                    &Response {
                        ok: true,
                        result: Some(result),
                        ..Default::default()
                    },
                )
                .await?;
            }
            Opcode::Subscribe => {
                let mut rx = actor.watch();
                let names = actor.schema_names().await;
                while rx.changed().await.is_ok() {
                    let snapshot = rx.borrow().clone();
                    let active: Vec<String> = names
                        .iter()
                        .filter(|n| snapshot.get(n) % 2 == 1)
                        .cloned()
                        .collect();
                    let response = Response {
                        ok: true,
                        active: Some(active),
                        ..Default::default()
                    };
                    if write_response(&mut writer, &response).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> std::io::Result<()> {
    let mut line = serde_json::to_string(response).expect("Response always serialises");
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use machina_actor::{Actor, ActorConfig};
    use machina_core::{Schema, State};
    use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader as TokioBufReader};
    use tokio::net::UnixStream as ClientStream;

    fn chain_schema() -> Schema {
        Schema::build([("Start", State::new())]).unwrap()
    }

    #[tokio::test]
    async fn list_active_round_trips_over_the_socket() {
        let dir = std::env::temp_dir().join(format!("machina-repl-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let actor = Actor::new("a1", chain_schema(), ActorConfig::default());
        actor.handle().submit(Mutation::add(["Start"])).await;

        let mut actors = HashMap::new();
        actors.insert("a1".to_string(), actor.handle());
        let server = Server::bind(&dir, "test-machine", actors).await.unwrap();
        let socket_path = server.socket_path().to_path_buf();
        tokio::spawn(server.serve());

        let mut client = ClientStream::connect(&socket_path).await.unwrap();
        client
            .write_all(b"{\"opcode\":2,\"actor\":\"a1\"}\n")
            .await
            .unwrap();
        let (read_half, _write_half) = client.into_split();
        let mut lines = TokioBufReader::new(read_half).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let response: Response = serde_json::from_str(&line).unwrap();
        assert!(response.ok);
        assert_eq!(response.active, Some(vec!["Start".to_string()]));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn unknown_actor_returns_an_error_response() {
        let dir = std::env::temp_dir().join(format!("machina-repl-test-unknown-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let server = Server::bind(&dir, "test-machine", HashMap::new()).await.unwrap();
        let socket_path = server.socket_path().to_path_buf();
        tokio::spawn(server.serve());

        let mut client = ClientStream::connect(&socket_path).await.unwrap();
        client
            .write_all(b"{\"opcode\":2,\"actor\":\"ghost\"}\n")
            .await
            .unwrap();
        let (read_half, _write_half) = client.into_split();
        let mut lines = TokioBufReader::new(read_half).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let response: Response = serde_json::from_str(&line).unwrap();
        assert!(!response.ok);
        assert!(response.error.is_some());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
