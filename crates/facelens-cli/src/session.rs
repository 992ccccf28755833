use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use facelens_core::{
    AnalysisStats, AnalyzerError, FrameAnalysisResult, FrameAnalyzer, FrameSource, LandmarkEngine,
    SessionControl,
};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("analysis error: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("failed to spawn session thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("session thread exited without reporting")]
    ChannelClosed,
}

/// Handle to an analysis session running on its own thread.
pub struct SessionHandle {
    control: SessionControl,
    results: mpsc::UnboundedReceiver<FrameAnalysisResult>,
    done: oneshot::Receiver<Result<AnalysisStats, AnalyzerError>>,
}

impl SessionHandle {
    /// Clone-safe switch for stopping the session from elsewhere.
    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    /// Next appended result. `None` once the session thread has exited and
    /// every result has been received.
    pub async fn next_result(&mut self) -> Option<FrameAnalysisResult> {
        self.results.recv().await
    }

    /// Wait for the session thread and return its final statistics.
    pub async fn finish(self) -> Result<AnalysisStats, SessionError> {
        let outcome = self.done.await.map_err(|_| SessionError::ChannelClosed)?;
        Ok(outcome?)
    }
}

/// Spawn the analysis loop on a dedicated OS thread.
///
/// The session is started before the thread runs, so a stop requested
/// through the handle at any point is observed. Frames are pulled and
/// analyzed strictly one after another on that thread; every appended
/// result is forwarded to the handle.
pub fn spawn_session<E, S>(
    mut analyzer: FrameAnalyzer<E>,
    mut source: S,
) -> Result<SessionHandle, SessionError>
where
    E: LandmarkEngine + Send + 'static,
    S: FrameSource + Send + 'static,
{
    let (tx, results) = mpsc::unbounded_channel();
    analyzer.subscribe(move |result: &FrameAnalysisResult| {
        // Receiver gone means nobody is listening any more; keep analyzing
        let _ = tx.send(result.clone());
    });

    analyzer.start();
    let control = analyzer.control();
    let (done_tx, done) = oneshot::channel();

    std::thread::Builder::new()
        .name("facelens-session".into())
        .spawn(move || {
            tracing::info!("session thread started");
            let outcome = analyzer.drain(&mut source);
            if let Err(e) = &outcome {
                tracing::error!(error = %e, "session ended with error");
            }
            let _ = done_tx.send(outcome);
            tracing::info!("session thread exiting");
        })
        .map_err(SessionError::Spawn)?;

    Ok(SessionHandle {
        control,
        results,
        done,
    })
}
