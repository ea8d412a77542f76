//! FLDT server
//!
//! The gateway side: answers header, data and footer requests from the
//! update interfaces registered with it, and announces a new version to the
//! whole network when one is available. The server is stateless per request;
//! all transfer state lives on the client.

use crate::error::{FldtError, IotError};
use crate::fldt::MAX_FILE_TYPES;
use crate::transport::Transport;
use crate::update::UpdateInterface;
use iotrust_protocol::{
    DataRequest, DataResponse, FileInfo, FileType, FldtCommand, FooterRequest, FooterResponse,
    HeaderRequest, HeaderResponse, PeerAddr, WireWrite, MAX_CHUNK_LEN,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

struct ServerMapping {
    file_type: FileType,
    updater: Arc<dyn UpdateInterface>,
}

/// Gateway side of the file-delivery protocol
pub struct FldtServer {
    transport: Arc<dyn Transport>,
    /// Address clients should direct their requests to
    own_addr: PeerAddr,
    mappings: Mutex<Vec<ServerMapping>>,
}

impl FldtServer {
    pub fn new(transport: Arc<dyn Transport>, own_addr: PeerAddr) -> Self {
        Self {
            transport,
            own_addr,
            mappings: Mutex::new(Vec::new()),
        }
    }

    /// Offer a file type for distribution
    pub fn register(
        &self,
        file_type: FileType,
        updater: Arc<dyn UpdateInterface>,
    ) -> Result<(), IotError> {
        let mut mappings = self.lock_mappings()?;
        if let Some(mapping) = mappings.iter_mut().find(|m| m.file_type == file_type) {
            mapping.updater = updater;
            return Ok(());
        }
        if mappings.len() >= MAX_FILE_TYPES {
            return Err(FldtError::NoSpaceForMapping.into());
        }
        mappings.push(ServerMapping { file_type, updater });
        debug!(file_type = %file_type.id, "File type offered for distribution");
        Ok(())
    }

    /// Announce the current version of `file_type` to every client
    pub fn broadcast_new_file(&self, file_type: &FileType) -> Result<(), IotError> {
        let updater = self.updater_for(file_type)?;
        let version = updater.get_version(file_type)?;
        let info = FileInfo {
            file_type: *file_type,
            version,
            gateway: self.own_addr,
        };
        info!(file_type = %file_type.id, version = %version, "Announcing new file");
        self.transport
            .broadcast(FldtCommand::Infv, &info.to_bytes())
            .map_err(FldtError::from)?;
        Ok(())
    }

    /// Decode and answer one incoming request
    pub fn handle_message(
        &self,
        sender: &PeerAddr,
        command: FldtCommand,
        payload: &[u8],
    ) -> Result<(), IotError> {
        let malformed = |e: std::io::Error| FldtError::Malformed(e.to_string());
        match command {
            FldtCommand::Gnfh => {
                let request = HeaderRequest::decode(payload).map_err(malformed)?;
                self.on_header_request(sender, &request)
            }
            FldtCommand::Gnfd => {
                let request = DataRequest::decode(payload).map_err(malformed)?;
                self.on_data_request(sender, &request)
            }
            FldtCommand::Gnff => {
                let request = FooterRequest::decode(payload).map_err(malformed)?;
                self.on_footer_request(sender, &request)
            }
            FldtCommand::Infv => Err(FldtError::UnexpectedResponse.into()),
        }
    }

    /// Answer a GNFH request.
    ///
    /// Stays silent when the requester already holds our version or newer;
    /// the registration probe of an up-to-date client deserves no reply.
    pub fn on_header_request(
        &self,
        sender: &PeerAddr,
        request: &HeaderRequest,
    ) -> Result<(), IotError> {
        let updater = self.updater_for(&request.file_type)?;
        let version = updater.get_version(&request.file_type)?;
        if !updater.file_is_newer(&request.file_type, &request.version, &version) {
            debug!(file_type = %request.file_type.id, requested = %request.version,
                   available = %version, "Requester is up to date or ahead, no reply");
            return Ok(());
        }

        let header = updater.get_header(&request.file_type)?;
        let file_size = updater.get_file_size(&request.file_type, &header)?;
        let has_footer = updater.has_footer(&request.file_type)?;
        let response = HeaderResponse {
            file_type: request.file_type,
            version,
            gateway: self.own_addr,
            file_size: file_size as u32,
            has_footer,
            header,
        };
        debug!(file_type = %request.file_type.id, version = %version, peer = %sender,
               "Serving header");
        self.transport
            .send(sender, FldtCommand::Gnfh, &response.to_bytes())
            .map_err(FldtError::from)?;
        Ok(())
    }

    /// Answer a GNFD request with one chunk
    pub fn on_data_request(
        &self,
        sender: &PeerAddr,
        request: &DataRequest,
    ) -> Result<(), IotError> {
        let updater = self.updater_for(&request.file_type)?;
        let version = updater.get_version(&request.file_type)?;
        if request.version != version {
            // The requester chases a version we no longer hold; its header
            // request will resynchronize it.
            warn!(file_type = %request.file_type.id, requested = %request.version,
                  available = %version, "Data request for a version we do not hold");
            return self.on_header_request(
                sender,
                &HeaderRequest {
                    file_type: request.file_type,
                    version: request.version,
                },
            );
        }

        let header = updater.get_header(&request.file_type)?;
        let data = updater.get_data(
            &request.file_type,
            &header,
            request.offset as usize,
            MAX_CHUNK_LEN,
        )?;
        let next_offset =
            updater.inc_data_offset(&request.file_type, request.offset as usize, data.len())?;
        let response = DataResponse {
            file_type: request.file_type,
            version,
            offset: request.offset,
            next_offset: next_offset as u32,
            data,
        };
        self.transport
            .send(sender, FldtCommand::Gnfd, &response.to_bytes())
            .map_err(FldtError::from)?;
        Ok(())
    }

    /// Answer a GNFF request
    pub fn on_footer_request(
        &self,
        sender: &PeerAddr,
        request: &FooterRequest,
    ) -> Result<(), IotError> {
        let updater = self.updater_for(&request.file_type)?;
        let version = updater.get_version(&request.file_type)?;
        if request.version != version {
            warn!(file_type = %request.file_type.id, requested = %request.version,
                  available = %version, "Footer request for a version we do not hold");
            return self.on_header_request(
                sender,
                &HeaderRequest {
                    file_type: request.file_type,
                    version: request.version,
                },
            );
        }

        let header = updater.get_header(&request.file_type)?;
        let footer = updater.get_footer(&request.file_type, &header)?;
        let response = FooterResponse {
            file_type: request.file_type,
            version,
            footer,
        };
        self.transport
            .send(sender, FldtCommand::Gnff, &response.to_bytes())
            .map_err(FldtError::from)?;
        Ok(())
    }

    fn lock_mappings(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Vec<ServerMapping>>, IotError> {
        self.mappings
            .lock()
            .map_err(|_| FldtError::Malformed("Mapping table lock poisoned".into()).into())
    }

    fn updater_for(&self, file_type: &FileType) -> Result<Arc<dyn UpdateInterface>, IotError> {
        let mappings = self.lock_mappings()?;
        mappings
            .iter()
            .find(|m| m.file_type == *file_type)
            .map(|m| Arc::clone(&m.updater))
            .ok_or_else(|| FldtError::UnregisteredFileType.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::QueueTransport;
    use iotrust_protocol::FileVersion;

    /// Serves a fixed in-memory artifact in byte chunks
    struct FixedFile {
        version: FileVersion,
        body: Vec<u8>,
        chunk: usize,
    }

    impl UpdateInterface for FixedFile {
        fn get_header_size(&self, _t: &FileType) -> Result<usize, IotError> {
            Ok(4)
        }
        fn get_header(&self, _t: &FileType) -> Result<Vec<u8>, IotError> {
            Ok((self.body.len() as u32).to_be_bytes().to_vec())
        }
        fn get_version(&self, _t: &FileType) -> Result<FileVersion, IotError> {
            Ok(self.version)
        }
        fn get_file_size(&self, _t: &FileType, _h: &[u8]) -> Result<usize, IotError> {
            Ok(self.body.len())
        }
        fn has_footer(&self, _t: &FileType) -> Result<bool, IotError> {
            Ok(true)
        }
        fn get_data(
            &self,
            _t: &FileType,
            _h: &[u8],
            offset: usize,
            max_len: usize,
        ) -> Result<Vec<u8>, IotError> {
            let end = (offset + self.chunk.min(max_len)).min(self.body.len());
            Ok(self.body[offset..end].to_vec())
        }
        fn inc_data_offset(
            &self,
            _t: &FileType,
            offset: usize,
            loaded_size: usize,
        ) -> Result<usize, IotError> {
            Ok(offset + loaded_size)
        }
        fn get_footer(&self, _t: &FileType, _h: &[u8]) -> Result<Vec<u8>, IotError> {
            Ok(b"FTR".to_vec())
        }
        fn set_header(&self, _t: &FileType, _h: &[u8]) -> Result<usize, IotError> {
            unreachable!("server side never stages")
        }
        fn set_data(&self, _t: &FileType, _h: &[u8], _d: &[u8], _o: usize) -> Result<(), IotError> {
            unreachable!("server side never stages")
        }
        fn set_footer(&self, _t: &FileType, _h: &[u8], _f: &[u8]) -> Result<(), IotError> {
            unreachable!("server side never stages")
        }
        fn delete_object(&self, _t: &FileType) -> Result<(), IotError> {
            Ok(())
        }
    }

    fn own_addr() -> PeerAddr {
        PeerAddr([1; 6])
    }

    fn client_addr() -> PeerAddr {
        PeerAddr([2; 6])
    }

    fn file_type() -> FileType {
        FileType::firmware(b"ACME-GW01")
    }

    fn setup(body: Vec<u8>) -> (FldtServer, Arc<QueueTransport>) {
        let transport = Arc::new(QueueTransport::new());
        let server = FldtServer::new(Arc::clone(&transport) as Arc<dyn Transport>, own_addr());
        server
            .register(
                file_type(),
                Arc::new(FixedFile {
                    version: FileVersion::new(2, 0, 0, 0),
                    body,
                    chunk: 16,
                }),
            )
            .unwrap();
        (server, transport)
    }

    #[test]
    fn test_announce() {
        let (server, transport) = setup(vec![0xAB; 40]);
        server.broadcast_new_file(&file_type()).unwrap();

        let sent = transport.pop().unwrap();
        assert_eq!(sent.command, FldtCommand::Infv);
        assert!(sent.peer.is_broadcast());
        let info = FileInfo::decode(&sent.payload).unwrap();
        assert_eq!(info.version, FileVersion::new(2, 0, 0, 0));
        assert_eq!(info.gateway, own_addr());
    }

    #[test]
    fn test_header_request_from_older_client() {
        let (server, transport) = setup(vec![0xAB; 40]);
        server
            .on_header_request(
                &client_addr(),
                &HeaderRequest {
                    file_type: file_type(),
                    version: FileVersion::new(1, 0, 0, 0),
                },
            )
            .unwrap();

        let sent = transport.pop().unwrap();
        assert_eq!(sent.command, FldtCommand::Gnfh);
        assert_eq!(sent.peer, client_addr());
        let response = HeaderResponse::decode(&sent.payload).unwrap();
        assert_eq!(response.file_size, 40);
        assert!(response.has_footer);
        assert_eq!(response.gateway, own_addr());
    }

    #[test]
    fn test_up_to_date_probe_gets_no_reply() {
        let (server, transport) = setup(vec![0xAB; 40]);
        server
            .on_header_request(
                &client_addr(),
                &HeaderRequest {
                    file_type: file_type(),
                    version: FileVersion::new(2, 0, 0, 0),
                },
            )
            .unwrap();
        assert!(transport.is_empty());

        // A requester ahead of us gets no reply either
        server
            .on_header_request(
                &client_addr(),
                &HeaderRequest {
                    file_type: file_type(),
                    version: FileVersion::new(3, 0, 0, 0),
                },
            )
            .unwrap();
        assert!(transport.is_empty());
    }

    #[test]
    fn test_data_request_serves_chunks() {
        let body: Vec<u8> = (0..40u8).collect();
        let (server, transport) = setup(body.clone());

        server
            .on_data_request(
                &client_addr(),
                &DataRequest {
                    file_type: file_type(),
                    version: FileVersion::new(2, 0, 0, 0),
                    offset: 16,
                },
            )
            .unwrap();

        let sent = transport.pop().unwrap();
        let response = DataResponse::decode(&sent.payload).unwrap();
        assert_eq!(response.offset, 16);
        assert_eq!(response.next_offset, 32);
        assert_eq!(response.data, body[16..32]);

        // Last partial chunk
        server
            .on_data_request(
                &client_addr(),
                &DataRequest {
                    file_type: file_type(),
                    version: FileVersion::new(2, 0, 0, 0),
                    offset: 32,
                },
            )
            .unwrap();
        let response = DataResponse::decode(&transport.pop().unwrap().payload).unwrap();
        assert_eq!(response.next_offset, 40);
        assert_eq!(response.data, body[32..40]);
    }

    #[test]
    fn test_stale_data_request_resyncs_with_header() {
        let (server, transport) = setup(vec![1; 8]);
        server
            .on_data_request(
                &client_addr(),
                &DataRequest {
                    file_type: file_type(),
                    version: FileVersion::new(1, 5, 0, 0),
                    offset: 0,
                },
            )
            .unwrap();

        // The reply is a header for the version we actually hold
        let sent = transport.pop().unwrap();
        assert_eq!(sent.command, FldtCommand::Gnfh);
        let response = HeaderResponse::decode(&sent.payload).unwrap();
        assert_eq!(response.version, FileVersion::new(2, 0, 0, 0));
    }

    #[test]
    fn test_footer_request() {
        let (server, transport) = setup(vec![1; 8]);
        server
            .on_footer_request(
                &client_addr(),
                &FooterRequest {
                    file_type: file_type(),
                    version: FileVersion::new(2, 0, 0, 0),
                },
            )
            .unwrap();
        let response = FooterResponse::decode(&transport.pop().unwrap().payload).unwrap();
        assert_eq!(response.footer, b"FTR");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let (server, _) = setup(vec![1; 8]);
        let result = server.on_header_request(
            &client_addr(),
            &HeaderRequest {
                file_type: FileType::trust_list(),
                version: FileVersion::default(),
            },
        );
        assert!(matches!(
            result,
            Err(IotError::Fldt(FldtError::UnregisteredFileType))
        ));
    }
}
