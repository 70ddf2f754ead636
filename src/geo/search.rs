//! Debounced address search: only the last query typed within the quiet
//! window reaches the geocoder

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::geo::{GeocodedAddress, Geocoder};

/// Search results for one settled query
#[derive(Debug, Clone, PartialEq)]
pub struct AddressSuggestions {
    pub query: String,
    /// Matches, or the message to show when the lookup failed
    pub results: std::result::Result<Vec<GeocodedAddress>, String>,
}

/// Handle feeding keystrokes to the background search task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct DebouncedAddressSearch {
    input: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl DebouncedAddressSearch {
    /// Start the search task; suggestions arrive on the returned receiver
    pub fn spawn(
        geocoder: Arc<dyn Geocoder>,
        window: Duration,
    ) -> (Self, mpsc::Receiver<AddressSuggestions>) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::channel(16);
        let task = tokio::spawn(run(geocoder, window, input_rx, output_tx));
        (Self { input: input_tx, task }, output_rx)
    }

    /// Report the current contents of the search box
    pub fn input(&self, query: &str) {
        if self.input.send(query.to_string()).is_err() {
            debug!("address search task has stopped");
        }
    }
}

impl Drop for DebouncedAddressSearch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    geocoder: Arc<dyn Geocoder>,
    window: Duration,
    mut input: mpsc::UnboundedReceiver<String>,
    output: mpsc::Sender<AddressSuggestions>,
) {
    while let Some(first) = input.recv().await {
        let mut pending = first;

        // Restart the window on every keystroke.
        loop {
            tokio::select! {
                next = input.recv() => match next {
                    Some(query) => {
                        trace!("query superseded");
                        pending = query;
                    }
                    None => return,
                },
                _ = sleep(window) => break,
            }
        }

        let results = geocoder.search(&pending).await.map_err(|e| e.to_string());
        let suggestions = AddressSuggestions { query: pending, results };
        if output.send(suggestions).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::geo::Coordinates;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGeocoder {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Geocoder for RecordingGeocoder {
        async fn search(&self, query: &str) -> Result<Vec<GeocodedAddress>> {
            self.queries.lock().unwrap().push(query.to_string());
            if query == "fail" {
                return Err(Error::geocoding("service down"));
            }
            Ok(vec![GeocodedAddress {
                display_name: format!("{} street", query),
                coordinates: Coordinates::new(52.0, 5.0),
                city: None,
                postcode: None,
                country: None,
            }])
        }

        async fn reverse(&self, _: Coordinates) -> Result<Option<GeocodedAddress>> {
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_typing_searches_once_for_final_query() {
        let geocoder = Arc::new(RecordingGeocoder::default());
        let (search, mut suggestions) =
            DebouncedAddressSearch::spawn(geocoder.clone(), Duration::from_millis(300));

        for query in ["ma", "mai", "main", "main s", "main st"] {
            search.input(query);
            sleep(Duration::from_millis(100)).await;
        }

        let settled = suggestions.recv().await.unwrap();
        assert_eq!(settled.query, "main st");
        assert_eq!(settled.results.unwrap()[0].display_name, "main st street");
        assert_eq!(*geocoder.queries.lock().unwrap(), vec!["main st".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_longer_than_the_window_search_each_query() {
        let geocoder = Arc::new(RecordingGeocoder::default());
        let (search, mut suggestions) =
            DebouncedAddressSearch::spawn(geocoder.clone(), Duration::from_millis(300));

        search.input("oak lane");
        sleep(Duration::from_millis(400)).await;
        search.input("fail");

        assert_eq!(suggestions.recv().await.unwrap().query, "oak lane");
        let failed = suggestions.recv().await.unwrap();
        assert_eq!(failed.results, Err("Geocoding error: service down".to_string()));
        assert_eq!(geocoder.queries.lock().unwrap().len(), 2);
    }
}
