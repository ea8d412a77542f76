//! FLDT client
//!
//! One mapping per registered file type, one transfer at a time per mapping.
//! A transfer is started by an INFV announcement (or by a gateway answering
//! the availability probe sent at registration) and walks
//! header -> data -> footer. Every outgoing request is remembered so a silent
//! gateway gets the identical bytes again after [`WAIT_MAX_TICKS`] ticks,
//! [`RETRY_MAX`] times, before the transfer is abandoned and the staged
//! artifact discarded.

use crate::error::{FldtError, IotError};
use crate::fldt::{MAX_FILE_TYPES, RETRY_MAX, WAIT_MAX_TICKS};
use crate::transport::Transport;
use crate::update::{GotFileCallback, GotFileEvent, UpdateInterface};
use iotrust_protocol::{
    DataRequest, DataResponse, FileInfo, FileType, FileVersion, FldtCommand, FooterRequest,
    FooterResponse, HeaderRequest, HeaderResponse, PeerAddr, WireWrite,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferState {
    AwaitingHeader,
    AwaitingData,
    AwaitingFooter,
}

/// A download in flight
struct Transfer {
    target_version: FileVersion,
    gateway: PeerAddr,
    state: TransferState,
    /// Header blob as staged through the update interface
    header: Vec<u8>,
    /// Total size in the consumer's offset units
    file_size: usize,
    has_footer: bool,
    expected_offset: usize,
    retry_used: u32,
    tick_cnt: u32,
    last_command: FldtCommand,
    last_request: Vec<u8>,
}

impl Transfer {
    fn new(target_version: FileVersion, gateway: PeerAddr) -> Self {
        Self {
            target_version,
            gateway,
            state: TransferState::AwaitingHeader,
            header: Vec::new(),
            file_size: 0,
            has_footer: false,
            expected_offset: 0,
            retry_used: 0,
            tick_cnt: 0,
            last_command: FldtCommand::Gnfh,
            last_request: Vec::new(),
        }
    }
}

struct ClientMapping {
    file_type: FileType,
    updater: Arc<dyn UpdateInterface>,
    current_version: FileVersion,
    prev_version: FileVersion,
    transfer: Option<Transfer>,
}

/// A finished attempt, reported outside the mapping lock
struct Completed {
    file_type: FileType,
    prev_version: FileVersion,
    new_version: FileVersion,
    gateway: PeerAddr,
    success: bool,
}

/// Client side of the file-delivery protocol
pub struct FldtClient {
    transport: Arc<dyn Transport>,
    mappings: Mutex<Vec<ClientMapping>>,
    got_file: Option<GotFileCallback>,
}

impl FldtClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            mappings: Mutex::new(Vec::new()),
            got_file: None,
        }
    }

    /// Client that reports every finished attempt through `callback`
    pub fn with_callback(transport: Arc<dyn Transport>, callback: GotFileCallback) -> Self {
        Self {
            transport,
            mappings: Mutex::new(Vec::new()),
            got_file: Some(callback),
        }
    }

    /// Register a file type and probe the network for a newer version.
    ///
    /// Registering an already-known type replaces its update interface and
    /// refreshes the known version. The mapping table has a fixed capacity.
    pub fn register(
        &self,
        file_type: FileType,
        updater: Arc<dyn UpdateInterface>,
    ) -> Result<(), IotError> {
        let current_version = updater.get_version(&file_type).unwrap_or_default();
        {
            let mut mappings = self.lock_mappings()?;
            if let Some(mapping) = mappings.iter_mut().find(|m| m.file_type == file_type) {
                // A replaced interface must not keep a half-staged artifact
                if mapping.transfer.take().is_some() {
                    if let Err(err) = mapping.updater.delete_object(&file_type) {
                        warn!(file_type = %file_type.id, error = %err,
                              "Failed to discard staged artifact");
                    }
                }
                mapping.updater = updater;
                mapping.current_version = current_version;
            } else {
                if mappings.len() >= MAX_FILE_TYPES {
                    return Err(FldtError::NoSpaceForMapping.into());
                }
                mappings.push(ClientMapping {
                    file_type,
                    updater,
                    current_version,
                    prev_version: current_version,
                    transfer: None,
                });
            }
        }
        debug!(file_type = %file_type.id, version = %current_version, "File type registered");

        // Availability probe: any gateway holding a newer version answers
        // with its header, which starts a transfer.
        let probe = HeaderRequest {
            file_type,
            version: current_version,
        };
        self.transport
            .broadcast(FldtCommand::Gnfh, &probe.to_bytes())
            .map_err(FldtError::from)?;
        Ok(())
    }

    /// Decode and dispatch one incoming FLDT message
    pub fn handle_message(
        &self,
        sender: &PeerAddr,
        command: FldtCommand,
        payload: &[u8],
    ) -> Result<(), IotError> {
        let malformed = |e: std::io::Error| FldtError::Malformed(e.to_string());
        match command {
            FldtCommand::Infv => {
                let info = FileInfo::decode(payload).map_err(malformed)?;
                self.on_new_file(&info)
            }
            FldtCommand::Gnfh => {
                let response = HeaderResponse::decode(payload).map_err(malformed)?;
                self.on_header_response(sender, &response)
            }
            FldtCommand::Gnfd => {
                let response = DataResponse::decode(payload).map_err(malformed)?;
                self.on_data_response(sender, &response)
            }
            FldtCommand::Gnff => {
                let response = FooterResponse::decode(payload).map_err(malformed)?;
                self.on_footer_response(sender, &response)
            }
        }
    }

    /// Handle an INFV announcement
    pub fn on_new_file(&self, info: &FileInfo) -> Result<(), IotError> {
        let mut mappings = self.lock_mappings()?;
        let mapping = Self::find(&mut mappings, &info.file_type)?;

        if !mapping
            .updater
            .file_is_newer(&info.file_type, &mapping.current_version, &info.version)
        {
            debug!(file_type = %info.file_type.id, announced = %info.version,
                   current = %mapping.current_version, "Announcement is not newer, ignored");
            return Ok(());
        }
        if let Some(transfer) = &mapping.transfer {
            if !info.version.is_newer_than(&transfer.target_version) {
                debug!(file_type = %info.file_type.id,
                       "Already downloading this or a newer version");
                return Ok(());
            }
        }

        info!(file_type = %info.file_type.id, version = %info.version,
              gateway = %info.gateway, "New file announced, requesting header");
        // A header request always states the version we hold; the gateway
        // answers with whatever newer version it serves.
        let current_version = mapping.current_version;
        let mut transfer = Transfer::new(info.version, info.gateway);
        self.send_tracked(
            &mut transfer,
            FldtCommand::Gnfh,
            &HeaderRequest {
                file_type: info.file_type,
                version: current_version,
            }
            .to_bytes(),
        )?;
        mapping.transfer = Some(transfer);
        Ok(())
    }

    /// Handle a GNFH response
    pub fn on_header_response(
        &self,
        _sender: &PeerAddr,
        response: &HeaderResponse,
    ) -> Result<(), IotError> {
        let completed = {
            let mut mappings = self.lock_mappings()?;
            let mapping = Self::find(&mut mappings, &response.file_type)?;

            if !mapping.updater.file_is_newer(
                &response.file_type,
                &mapping.current_version,
                &response.version,
            ) {
                debug!(file_type = %response.file_type.id, offered = %response.version,
                       "Offered header is not newer");
                return Err(FldtError::OldVersion.into());
            }
            if let Some(transfer) = &mapping.transfer {
                if transfer.target_version.is_newer_than(&response.version) {
                    return Ok(());
                }
            }
            if response.file_size == 0 {
                warn!(file_type = %response.file_type.id, version = %response.version,
                      "Header response declares an empty file, ignored");
                return Ok(());
            }

            let file_size = match mapping
                .updater
                .set_header(&response.file_type, &response.header)
            {
                Ok(size) => size,
                Err(err) => {
                    warn!(file_type = %response.file_type.id, error = %err,
                          "Header rejected, abandoning transfer");
                    let completed = Self::abandon(mapping, response.gateway, response.version);
                    drop(mappings);
                    self.report(Some(completed));
                    return Ok(());
                }
            };

            let mut transfer = Transfer::new(response.version, response.gateway);
            transfer.header = response.header.clone();
            transfer.file_size = file_size;
            transfer.has_footer = response.has_footer;

            if file_size == 0 && !response.has_footer {
                // Nothing to download beyond the header itself
                mapping.transfer = None;
                Some(Self::finish(mapping, response.version, response.gateway))
            } else if file_size == 0 {
                transfer.state = TransferState::AwaitingFooter;
                self.send_tracked(
                    &mut transfer,
                    FldtCommand::Gnff,
                    &FooterRequest {
                        file_type: response.file_type,
                        version: response.version,
                    }
                    .to_bytes(),
                )?;
                mapping.transfer = Some(transfer);
                None
            } else {
                transfer.state = TransferState::AwaitingData;
                transfer.expected_offset = 0;
                self.send_tracked(
                    &mut transfer,
                    FldtCommand::Gnfd,
                    &DataRequest {
                        file_type: response.file_type,
                        version: response.version,
                        offset: 0,
                    }
                    .to_bytes(),
                )?;
                mapping.transfer = Some(transfer);
                None
            }
        };
        self.report(completed);
        Ok(())
    }

    /// Handle a GNFD response
    pub fn on_data_response(
        &self,
        _sender: &PeerAddr,
        response: &DataResponse,
    ) -> Result<(), IotError> {
        let completed = {
            let mut mappings = self.lock_mappings()?;
            let mapping = Self::find(&mut mappings, &response.file_type)?;
            let Some(transfer) = mapping.transfer.as_mut() else {
                return Ok(());
            };
            if transfer.state != TransferState::AwaitingData {
                return Ok(());
            }
            if response.version != transfer.target_version {
                return self.restart_if_newer(mapping, &response.file_type, response.version);
            }
            if response.offset as usize != transfer.expected_offset {
                debug!(file_type = %response.file_type.id, offset = response.offset,
                       expected = transfer.expected_offset, "Unexpected chunk offset, ignored");
                return Ok(());
            }

            if let Err(err) = mapping.updater.set_data(
                &response.file_type,
                &transfer.header,
                &response.data,
                response.offset as usize,
            ) {
                warn!(file_type = %response.file_type.id, error = %err,
                      "Chunk rejected, abandoning transfer");
                let gateway = transfer.gateway;
                let version = transfer.target_version;
                let completed = Self::abandon(mapping, gateway, version);
                drop(mappings);
                self.report(Some(completed));
                return Ok(());
            }

            let next_offset = response.next_offset as usize;
            if next_offset < transfer.file_size {
                transfer.expected_offset = next_offset;
                transfer.retry_used = 0;
                self.send_tracked(
                    transfer,
                    FldtCommand::Gnfd,
                    &DataRequest {
                        file_type: response.file_type,
                        version: response.version,
                        offset: response.next_offset,
                    }
                    .to_bytes(),
                )?;
                None
            } else if transfer.has_footer {
                transfer.state = TransferState::AwaitingFooter;
                transfer.retry_used = 0;
                self.send_tracked(
                    transfer,
                    FldtCommand::Gnff,
                    &FooterRequest {
                        file_type: response.file_type,
                        version: response.version,
                    }
                    .to_bytes(),
                )?;
                None
            } else {
                let gateway = transfer.gateway;
                let version = transfer.target_version;
                mapping.transfer = None;
                Some(Self::finish(mapping, version, gateway))
            }
        };
        self.report(completed);
        Ok(())
    }

    /// Handle a GNFF response
    pub fn on_footer_response(
        &self,
        _sender: &PeerAddr,
        response: &FooterResponse,
    ) -> Result<(), IotError> {
        let completed = {
            let mut mappings = self.lock_mappings()?;
            let mapping = Self::find(&mut mappings, &response.file_type)?;
            let Some(transfer) = mapping.transfer.as_ref() else {
                return Ok(());
            };
            if transfer.state != TransferState::AwaitingFooter {
                return Ok(());
            }
            if response.version != transfer.target_version {
                return self.restart_if_newer(mapping, &response.file_type, response.version);
            }

            let gateway = transfer.gateway;
            let version = transfer.target_version;
            let header = transfer.header.clone();
            match mapping
                .updater
                .set_footer(&response.file_type, &header, &response.footer)
            {
                Ok(()) => {
                    mapping.transfer = None;
                    Some(Self::finish(mapping, version, gateway))
                }
                Err(err) => {
                    warn!(file_type = %response.file_type.id, error = %err,
                          "Footer rejected, abandoning transfer");
                    let completed = Self::abandon(mapping, gateway, version);
                    drop(mappings);
                    self.report(Some(completed));
                    return Ok(());
                }
            }
        };
        self.report(completed);
        Ok(())
    }

    /// Advance every in-flight transfer's wait counter.
    ///
    /// Call at a fixed cadence. A transfer that has waited [`WAIT_MAX_TICKS`]
    /// ticks gets its last request resent; after [`RETRY_MAX`] resends it is
    /// abandoned and the staged artifact deleted.
    pub fn periodic_tick(&self) -> Result<(), IotError> {
        let mut finished = Vec::new();
        {
            let mut mappings = self.lock_mappings()?;
            for mapping in mappings.iter_mut() {
                let Some(transfer) = mapping.transfer.as_mut() else {
                    continue;
                };
                transfer.tick_cnt += 1;
                if transfer.tick_cnt < WAIT_MAX_TICKS {
                    continue;
                }
                if transfer.retry_used < RETRY_MAX {
                    transfer.retry_used += 1;
                    transfer.tick_cnt = 0;
                    debug!(file_type = %mapping.file_type.id, attempt = transfer.retry_used,
                           "No response, retrying last request");
                    self.transport
                        .send(
                            &transfer.gateway,
                            transfer.last_command,
                            &transfer.last_request,
                        )
                        .map_err(FldtError::from)?;
                } else {
                    warn!(file_type = %mapping.file_type.id,
                          version = %transfer.target_version,
                          "Retries exhausted, abandoning transfer");
                    let gateway = transfer.gateway;
                    let version = transfer.target_version;
                    if let Err(err) = mapping.updater.delete_object(&mapping.file_type) {
                        warn!(file_type = %mapping.file_type.id, error = %err,
                              "Failed to discard staged artifact");
                    }
                    mapping.transfer = None;
                    finished.push(Completed {
                        file_type: mapping.file_type,
                        prev_version: mapping.current_version,
                        new_version: version,
                        gateway,
                        success: false,
                    });
                }
            }
        }
        for completed in finished {
            self.report(Some(completed));
        }
        Ok(())
    }

    /// Version currently held for a registered file type
    pub fn current_version(&self, file_type: &FileType) -> Result<FileVersion, IotError> {
        let mut mappings = self.lock_mappings()?;
        Ok(Self::find(&mut mappings, file_type)?.current_version)
    }

    fn lock_mappings(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Vec<ClientMapping>>, IotError> {
        self.mappings
            .lock()
            .map_err(|_| FldtError::Malformed("Mapping table lock poisoned".into()).into())
    }

    fn find<'a>(
        mappings: &'a mut Vec<ClientMapping>,
        file_type: &FileType,
    ) -> Result<&'a mut ClientMapping, IotError> {
        mappings
            .iter_mut()
            .find(|m| m.file_type == *file_type)
            .ok_or_else(|| FldtError::UnregisteredFileType.into())
    }

    /// Send a request and remember it for retransmission
    fn send_tracked(
        &self,
        transfer: &mut Transfer,
        command: FldtCommand,
        payload: &[u8],
    ) -> Result<(), IotError> {
        self.transport
            .send(&transfer.gateway, command, payload)
            .map_err(FldtError::from)?;
        transfer.last_command = command;
        transfer.last_request = payload.to_vec();
        transfer.tick_cnt = 0;
        Ok(())
    }

    /// A response carried a version other than the one in flight. A newer
    /// one means the gateway moved on mid-transfer; start over at its header.
    fn restart_if_newer(
        &self,
        mapping: &mut ClientMapping,
        file_type: &FileType,
        version: FileVersion,
    ) -> Result<(), IotError> {
        let Some(transfer) = mapping.transfer.as_mut() else {
            return Ok(());
        };
        if !version.is_newer_than(&transfer.target_version) {
            return Ok(());
        }
        info!(file_type = %file_type.id, version = %version,
              "Gateway offers a newer version mid-transfer, restarting");
        let gateway = transfer.gateway;
        let current_version = mapping.current_version;
        let mut restarted = Transfer::new(version, gateway);
        self.send_tracked(
            &mut restarted,
            FldtCommand::Gnfh,
            &HeaderRequest {
                file_type: *file_type,
                version: current_version,
            }
            .to_bytes(),
        )?;
        mapping.transfer = Some(restarted);
        Ok(())
    }

    /// Drop the transfer and discard staged state; the caller reports the
    /// failure once the mapping lock is released
    fn abandon(mapping: &mut ClientMapping, gateway: PeerAddr, version: FileVersion) -> Completed {
        if let Err(err) = mapping.updater.delete_object(&mapping.file_type) {
            warn!(file_type = %mapping.file_type.id, error = %err,
                  "Failed to discard staged artifact");
        }
        mapping.transfer = None;
        Completed {
            file_type: mapping.file_type,
            prev_version: mapping.current_version,
            new_version: version,
            gateway,
            success: false,
        }
    }

    /// Record a committed download on the mapping
    fn finish(mapping: &mut ClientMapping, version: FileVersion, gateway: PeerAddr) -> Completed {
        mapping.prev_version = mapping.current_version;
        mapping.current_version = version;
        mapping.updater.free_item(&mapping.file_type);
        info!(file_type = %mapping.file_type.id, version = %version, "Download committed");
        Completed {
            file_type: mapping.file_type,
            prev_version: mapping.prev_version,
            new_version: version,
            gateway,
            success: true,
        }
    }

    fn report(&self, completed: Option<Completed>) {
        let (Some(callback), Some(completed)) = (self.got_file.as_ref(), completed) else {
            return;
        };
        callback(GotFileEvent {
            file_type: &completed.file_type,
            prev_version: &completed.prev_version,
            new_version: &completed.new_version,
            gateway: &completed.gateway,
            success: completed.success,
        });
    }
}
