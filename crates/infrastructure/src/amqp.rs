use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    Consumer,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use aurora_foundation::{
    BrokerChannel, BrokerSession, BrokerTransport, DispatchError, DispatchResult,
    OutboundMessage, ResponseHandler, WireCodec,
};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 基于 lapin 的 AMQP 传输
pub struct AmqpTransport {
    connect_timeout: Duration,
}

impl AmqpTransport {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Default for AmqpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerTransport for AmqpTransport {
    async fn connect(&self, url: &str) -> DispatchResult<Arc<dyn BrokerSession>> {
        let connecting = Connection::connect(url, ConnectionProperties::default());
        let connection = tokio::time::timeout(self.connect_timeout, connecting)
            .await
            .map_err(|_| {
                DispatchError::connection_error(format!(
                    "连接RabbitMQ超时 ({:?})",
                    self.connect_timeout
                ))
            })?
            .map_err(|e| DispatchError::connection_error(format!("连接RabbitMQ失败: {e}")))?;

        info!("成功连接到RabbitMQ");
        Ok(Arc::new(AmqpSession { connection }))
    }
}

/// 一个 AMQP 连接
pub struct AmqpSession {
    connection: Connection,
}

#[async_trait]
impl BrokerSession for AmqpSession {
    fn is_open(&self) -> bool {
        self.connection.status().connected()
    }

    fn is_closed(&self) -> bool {
        let status = self.connection.status();
        status.closed() || status.errored()
    }

    async fn open_channel(&self) -> DispatchResult<Arc<dyn BrokerChannel>> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| DispatchError::connection_error(format!("创建通道失败: {e}")))?;

        debug!("通道 {} 已创建", channel.id());
        Ok(Arc::new(AmqpChannel { channel }))
    }

    async fn close(&self) -> DispatchResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| DispatchError::connection_error(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

/// AMQP 通道上的回复队列声明、消费和发布
pub struct AmqpChannel {
    channel: Channel,
}

impl AmqpChannel {
    fn publish_properties(message: &OutboundMessage) -> BasicProperties {
        BasicProperties::default()
            .with_reply_to(message.properties.reply_to.clone().into())
            .with_correlation_id(message.properties.correlation_id.to_string().into())
            .with_content_type(message.properties.content_type.clone().into())
    }

    /// 发布失败时根据通道状态区分通道失效和其他错误
    fn classify_publish_error(&self, stage: &str, error: lapin::Error) -> DispatchError {
        if self.channel.status().connected() {
            DispatchError::Internal(format!("{stage}: {error}"))
        } else {
            DispatchError::channel_unavailable(format!("{stage}: {error}"))
        }
    }

    async fn forward_replies(mut consumer: Consumer, handler: Arc<dyn ResponseHandler>) {
        while let Some(delivery) = consumer.next().await {
            match delivery {
                Ok(delivery) => {
                    let correlation_id = delivery
                        .properties
                        .correlation_id()
                        .as_ref()
                        .map(|id| id.as_str());
                    let reply = WireCodec::decode_reply(correlation_id, &delivery.data);
                    handler.on_response(reply).await;
                }
                Err(e) => {
                    warn!("回复消费者出错，停止消费: {}", e);
                    break;
                }
            }
        }
        debug!("回复消费者已退出");
    }
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    fn is_open(&self) -> bool {
        self.channel.status().connected()
    }

    async fn declare_reply_queue(&self) -> DispatchResult<String> {
        let queue = self
            .channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| DispatchError::connection_error(format!("声明回复队列失败: {e}")))?;

        let name = queue.name().as_str().to_string();
        debug!("回复队列 {} 声明成功", name);
        Ok(name)
    }

    async fn consume_replies(
        &self,
        queue: &str,
        handler: Arc<dyn ResponseHandler>,
    ) -> DispatchResult<()> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| DispatchError::connection_error(format!("创建消费者失败: {e}")))?;

        debug!("开始消费回复队列: {}", queue);
        tokio::spawn(Self::forward_replies(consumer, handler));
        Ok(())
    }

    async fn publish(&self, message: &OutboundMessage) -> DispatchResult<()> {
        if !self.is_open() {
            return Err(DispatchError::channel_unavailable(format!(
                "通道 {} 已关闭",
                self.channel.id()
            )));
        }

        let confirm = self
            .channel
            .basic_publish(
                "",
                &message.routing_key,
                BasicPublishOptions::default(),
                &message.payload,
                Self::publish_properties(message),
            )
            .await
            .map_err(|e| {
                self.classify_publish_error(&format!("发布消息到 {} 失败", message.routing_key), e)
            })?;

        confirm
            .await
            .map_err(|e| self.classify_publish_error("消息发布确认失败", e))?;

        debug!(
            "消息已发布到 {} (关联ID: {})",
            message.routing_key,
            message.correlation_id()
        );
        Ok(())
    }
}
